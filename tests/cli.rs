// Non-interactive entry points of the binary: none of these need a TTY.

use assert_cmd::Command;
use tempfile::TempDir;

fn ivory(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ivory").unwrap();
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env("XDG_DATA_HOME", home.path().join(".local").join("share"));
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

#[test]
fn list_prints_the_builtin_catalog() {
    let home = tempfile::tempdir().unwrap();
    let out = stdout_of(ivory(&home).arg("--list"));

    assert!(out.starts_with("ID"));
    assert!(out.contains("ode-to-joy"));
    assert!(out.contains("Clair de Lune"));
    // free play has no length
    assert!(out.lines().any(|l| l.starts_with("free-play") && l.contains("free")));
    // header plus every track
    assert_eq!(out.lines().count(), 13);
}

#[test]
fn search_filters_by_artist() {
    let home = tempfile::tempdir().unwrap();
    let out = stdout_of(ivory(&home).args(["--search", "beethoven"]));

    let ids: Vec<&str> = out
        .lines()
        .skip(1)
        .filter_map(|l| l.split_whitespace().next())
        .collect();
    assert_eq!(ids, vec!["fur-elise", "moonlight-sonata", "ode-to-joy"]);
}

#[test]
fn search_without_matches_prints_only_header() {
    let home = tempfile::tempdir().unwrap();
    let out = stdout_of(ivory(&home).args(["--search", "no such tune"]));
    assert_eq!(out.lines().count(), 1);
}

#[test]
fn profile_creates_a_fresh_player() {
    let home = tempfile::tempdir().unwrap();
    let out = stdout_of(ivory(&home).args(["--profile", "-u", "grace"]));

    assert!(out.contains("player:      grace"));
    assert!(out.contains("level:       1"));
    assert!(out.contains("games:       0"));
    assert!(home
        .path()
        .join(".local/state/ivory/profiles.db")
        .exists());
}

#[test]
fn custom_catalog_from_config() {
    let home = tempfile::tempdir().unwrap();
    let catalog = home.path().join("mine.json");
    std::fs::write(
        &catalog,
        r#"{ "tracks": [ { "id": "etude", "title": "Etude", "artist": "Me", "duration_secs": 20 } ] }"#,
    )
    .unwrap();
    let config_dir = home.path().join(".config").join("ivory");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.json"),
        format!(r#"{{ "catalog_path": {:?} }}"#, catalog.display().to_string()),
    )
    .unwrap();

    let out = stdout_of(ivory(&home).arg("--list"));
    assert!(out.contains("etude"));
    assert!(!out.contains("ode-to-joy"));
}

#[test]
fn interactive_mode_requires_a_tty() {
    let home = tempfile::tempdir().unwrap();
    ivory(&home)
        .write_stdin("")
        .assert()
        .failure();
}
