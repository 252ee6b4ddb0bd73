extern crate assert_cmd;
extern crate predicates;
extern crate tempfile;

#[cfg(test)]
mod tests {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use tempfile::TempDir;

    fn main_cmd() -> Command {
        Command::cargo_bin("pairsync").unwrap()
    }

    #[test]
    fn help_lists_all_subcommands() {
        main_cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("create"))
            .stdout(predicate::str::contains("scan"))
            .stdout(predicate::str::contains("sync"))
            .stdout(predicate::str::contains("optimize"));
    }

    #[test]
    fn no_subcommand_prints_usage_hint() {
        let dir = tempfile::tempdir().unwrap();
        main_cmd()
            .arg(dir.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("create, scan, sync, optimize"));
    }

    #[test]
    fn create_without_server_url_fails_argument_parsing() {
        let dir = tempfile::tempdir().unwrap();
        main_cmd()
            .arg(dir.path())
            .arg("create")
            .arg("--token")
            .arg("abc")
            .assert()
            .failure();
    }

    #[test]
    fn create_against_unreachable_server_reports_error_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        main_cmd()
            .arg(dir.path())
            .arg("create")
            .args(&["--server-url", "http://127.0.0.1:1"])
            .args(&["--token", "test-token"])
            .assert()
            .success()
            .stdout(predicate::str::contains(format!("Binding '{}'", dir.path().display())));
    }

    #[test]
    fn optimize_runs_against_a_freshly_created_database() {
        let dir = tempfile::tempdir().unwrap();
        bootstrap_binding(&dir);

        main_cmd()
            .arg(dir.path())
            .arg("optimize")
            .assert()
            .success()
            .stdout(predicate::str::contains("Optimization done"));
    }

    #[test]
    fn scan_against_a_freshly_created_binding_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        bootstrap_binding(&dir);

        main_cmd().arg(dir.path()).arg("scan").assert().success();
    }

    #[test]
    fn scan_without_a_binding_fails_instead_of_hanging() {
        let dir = tempfile::tempdir().unwrap();
        main_cmd().arg(dir.path()).arg("scan").assert().failure();
    }

    // `create` always succeeds locally (the binding row is written before any
    // remote round trip that could fail), so it doubles as setup for tests
    // that only care about the local database existing.
    fn bootstrap_binding(dir: &TempDir) {
        main_cmd()
            .arg(dir.path())
            .arg("create")
            .args(&["--server-url", "http://127.0.0.1:1"])
            .args(&["--token", "test-token"])
            .assert()
            .success();
    }
}
