use sitl_proto::{ModeSwitch, ShellCommand};
use sitl_shell::pattern::{ARMING, READY_TO_FLY, RECEIVED_PARAMS, SAVED_WAYPOINTS};
use sitl_shell::{CommandChannel, ScriptedShell};
use std::time::Duration;

const T: Duration = Duration::from_secs(5);

#[tokio::test]
async fn replies_follow_matching_command() {
    let mut shell = ScriptedShell::new().on("wp save", &["Saved 7 waypoints to ch7.txt"]);

    shell.send(&ShellCommand::switch(ModeSwitch::Loiter)).await.unwrap();
    assert!(shell.expect(&SAVED_WAYPOINTS, T).await.unwrap_err().is_timeout());

    shell.send(&ShellCommand::WpSave("ch7.txt".into())).await.unwrap();
    let m = shell.expect(&SAVED_WAYPOINTS, T).await.unwrap();
    assert_eq!(m.group(1), Some("7"));
    assert_eq!(shell.last_match().and_then(|m| m.group(1)), Some("7"));
    assert_eq!(shell.sent_lines(), vec!["switch 5", "wp save ch7.txt"]);
}

#[tokio::test]
async fn unmatched_lines_are_consumed() {
    let mut shell = ScriptedShell::new();
    shell.push_line("Mode STABILIZE");
    shell.push_line("APM: Arming motors");
    shell.push_line("APM: Arming motors");

    shell.expect(&ARMING, T).await.unwrap();
    shell.expect(&ARMING, T).await.unwrap();
    let err = shell.expect(&ARMING, T).await.unwrap_err();
    assert!(err.is_timeout());
    assert!(err.to_string().contains("APM: Arming motors"));
}

#[tokio::test]
async fn expect_any_reports_which_pattern() {
    let mut shell = ScriptedShell::new();
    shell.push_line("Ready to FLY ublox");
    shell.push_line("Received 912 parameters");

    let (i, _) = shell.expect_any(&[&*RECEIVED_PARAMS, &*READY_TO_FLY], T).await.unwrap();
    assert_eq!(i, 1);
    let (i, _) = shell.expect_any(&[&*RECEIVED_PARAMS, &*READY_TO_FLY], T).await.unwrap();
    assert_eq!(i, 0);
}
