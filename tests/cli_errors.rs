mod gemini_stub;

use std::fs;
use std::path::Path;

use gemini_stub::{GeminiStub, STUB_API_KEY};
use predicates::prelude::*;

fn bookindex(home: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("bookindex");
    cmd.current_dir(home)
        .env("HOME", home)
        .env_remove("RUST_LOG")
        .env_remove("GOOGLE_API_KEY")
        .env_remove("GEMINI_API_KEY")
        .env_remove("OPENAI_API_KEY")
        .env_remove("BOOKINDEX_GEMINI_BASE_URL");
    cmd
}

fn write_chapter(root: &Path, dir: &str, text: &str) -> anyhow::Result<()> {
    let chapter = root.join(dir);
    fs::create_dir_all(&chapter)?;
    fs::write(chapter.join("main.tex"), text)?;
    Ok(())
}

#[test]
fn extract_without_credentials_fails_before_writing() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    write_chapter(temp.path(), "01_intro", "Hello.")?;

    bookindex(temp.path())
        .args(["extract", "--root"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no Gemini API key found"));

    assert!(!temp.path().join("index").exists());
    Ok(())
}

#[test]
fn openai_engine_names_its_own_key() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    write_chapter(temp.path(), "01_intro", "Hello.")?;

    bookindex(temp.path())
        .args(["extract", "--engine", "openai", "--root"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
    Ok(())
}

#[test]
fn classify_before_extract_names_the_missing_step() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    write_chapter(temp.path(), "01_intro", "Hello.")?;

    bookindex(temp.path())
        .env("GEMINI_API_KEY", STUB_API_KEY)
        .args(["classify", "--root"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("run `bookindex extract` first"));
    Ok(())
}

#[test]
fn regenerate_without_results_names_classify() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;

    bookindex(temp.path())
        .args(["regenerate", "--root"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("run `bookindex classify` first"));
    Ok(())
}

#[test]
fn extract_without_chapters_fails() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    fs::create_dir_all(temp.path().join("figures"))?;

    bookindex(temp.path())
        .args(["extract", "--engine", "command", "--command", "true", "--root"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no chapter directories"));
    Ok(())
}

#[test]
fn command_engine_pipes_prompt_through_program() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    write_chapter(temp.path(), "01_heat", "Heat flows.")?;

    bookindex(temp.path())
        .args(["extract", "--engine", "command", "--command", "sh", "--root"])
        .arg(temp.path())
        .args([
            "--",
            "-c",
            r#"case "$(cat)" in *'Heat flows.'*) printf '%s' '{"subjects":[{"subject":"Entropy","subtopics":["Heat flow"]}]}' ;; *) exit 1 ;; esac"#,
        ])
        .assert()
        .success();

    let candidates: serde_json::Value = serde_json::from_str(&fs::read_to_string(
        temp.path().join("index/candidates.json"),
    )?)?;
    assert_eq!(
        candidates,
        serde_json::json!([{ "subject": "Entropy", "subtopics": ["heat flow"], "include": true }])
    );
    Ok(())
}

#[test]
fn dotenv_in_book_root_supplies_credentials() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let root = temp.path().join("book");
    write_chapter(&root, "01_intro", "Hello.")?;
    let stub = GeminiStub::spawn(|_| Ok(r#"{"subjects":[{"subject":"Greeting"}]}"#.to_owned()));
    fs::write(
        root.join(".env"),
        format!(
            "GEMINI_API_KEY={STUB_API_KEY}\nBOOKINDEX_GEMINI_BASE_URL={}\n",
            stub.base_url
        ),
    )?;

    bookindex(temp.path())
        .args(["extract", "--root"])
        .arg(&root)
        .assert()
        .success();

    assert!(root.join("index/candidates.json").is_file());
    Ok(())
}

#[test]
fn rust_log_debug_emits_debug_line_to_stderr() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;

    bookindex(temp.path())
        .env("RUST_LOG", "debug")
        .args(["regenerate", "--root"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("parsed cli"));
    Ok(())
}
