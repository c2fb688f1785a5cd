//! Device discovery and install tests driving the real binary with a
//! scripted fake adb

#![cfg(unix)]

mod common;

use common::{TestSetup, repatch_cmd};
use predicates::prelude::*;

/// Fake adb with one ready and one unauthorized device; the ready device
/// answers property queries
const TWO_DEVICES: &str = r#"if [ "$1" = "devices" ]; then
  echo "List of devices attached"
  echo "emulator-5554          device product:sdk_gphone64 model:sdk_gphone64 transport_id:1"
  echo "R5CT10XYZ      unauthorized transport_id:2"
elif [ "$1" = "-s" ] && [ "$3" = "shell" ]; then
  case "$5" in
    ro.product.model) echo "Pixel 7" ;;
    ro.product.cpu.abi) echo "arm64-v8a" ;;
  esac
fi"#;

#[test]
fn test_devices_lists_connected_devices() {
    let setup = TestSetup::new();
    let adb = setup.fake_adb(TWO_DEVICES);

    repatch_cmd()
        .arg("devices")
        .env("ADB", &adb)
        .assert()
        .success()
        .stdout(predicate::str::contains("emulator-5554"))
        .stdout(predicate::str::contains("ready"))
        .stdout(predicate::str::contains("Pixel 7"))
        .stdout(predicate::str::contains("arm64-v8a"))
        .stdout(predicate::str::contains("R5CT10XYZ"))
        .stdout(predicate::str::contains("unauthorized"));
}

#[test]
fn test_devices_with_nothing_connected() {
    let setup = TestSetup::new();
    let adb = setup.fake_adb(
        r#"if [ "$1" = "devices" ]; then echo "List of devices attached"; fi"#,
    );

    repatch_cmd()
        .arg("devices")
        .env("ADB", &adb)
        .assert()
        .success()
        .stdout(predicate::str::contains("No devices connected"));
}

#[test]
fn test_devices_without_adb() {
    repatch_cmd()
        .arg("devices")
        .env("ADB", "/nonexistent/adb")
        .assert()
        .failure()
        .stderr(predicate::str::contains("adb executable not found"));
}

#[test]
fn test_install_auto_picks_single_ready_device() {
    let setup = TestSetup::new();
    let apk = setup.write_apk("patched.apk");
    let adb = setup.fake_adb(&format!(
        r#"{TWO_DEVICES}
if [ "$1" = "-s" ] && [ "$3" = "install" ]; then
  exit 0
fi"#
    ));

    repatch_cmd()
        .arg("install")
        .arg(&apk)
        .env("ADB", &adb)
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed"))
        .stdout(predicate::str::contains("emulator-5554"));
}

#[test]
fn test_install_ambiguous_devices_names_candidates() {
    let setup = TestSetup::new();
    let apk = setup.write_apk("patched.apk");
    let adb = setup.fake_adb(
        r#"if [ "$1" = "devices" ]; then
  echo "List of devices attached"
  echo "emulator-5554 device"
  echo "R5CT10XYZ device"
fi"#,
    );

    repatch_cmd()
        .arg("install")
        .arg(&apk)
        .env("ADB", &adb)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Multiple devices"))
        .stderr(predicate::str::contains("emulator-5554"))
        .stderr(predicate::str::contains("R5CT10XYZ"));
}

#[test]
fn test_install_unknown_serial_fails_without_invoking_install() {
    let setup = TestSetup::new();
    let apk = setup.write_apk("patched.apk");
    let marker = setup.path().join("install-invoked");
    let adb = setup.fake_adb(&format!(
        r#"if [ "$1" = "devices" ]; then
  echo "List of devices attached"
  echo "emulator-5554 device"
elif [ "$1" = "-s" ] && [ "$3" = "install" ]; then
  touch "{}"
fi"#,
        marker.display()
    ));

    repatch_cmd()
        .arg("install")
        .arg(&apk)
        .args(["--device", "missing-serial"])
        .env("ADB", &adb)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Device not found"));

    assert!(!marker.exists());
}

#[test]
fn test_install_unauthorized_device_is_not_ready() {
    let setup = TestSetup::new();
    let apk = setup.write_apk("patched.apk");
    let adb = setup.fake_adb(TWO_DEVICES);

    repatch_cmd()
        .arg("install")
        .arg(&apk)
        .args(["--device", "R5CT10XYZ"])
        .env("ADB", &adb)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not ready"))
        .stderr(predicate::str::contains("unauthorized"));
}

#[test]
fn test_install_rejection_is_translated() {
    let setup = TestSetup::new();
    let apk = setup.write_apk("patched.apk");
    let adb = setup.fake_adb(&format!(
        r#"{TWO_DEVICES}
if [ "$1" = "-s" ] && [ "$3" = "install" ]; then
  echo "adb: failed to install patched.apk: Failure [INSTALL_FAILED_VERSION_DOWNGRADE]"
  exit 1
fi"#
    ));

    repatch_cmd()
        .arg("install")
        .arg(&apk)
        .env("ADB", &adb)
        .assert()
        .failure()
        .stderr(predicate::str::contains("newer version"));
}

#[test]
fn test_install_passes_allow_downgrade_flag() {
    let setup = TestSetup::new();
    let apk = setup.write_apk("patched.apk");
    let args_log = setup.path().join("adb-args.txt");
    let adb = setup.fake_adb(&format!(
        r#"if [ "$1" = "devices" ]; then
  echo "List of devices attached"
  echo "emulator-5554 device"
elif [ "$1" = "-s" ] && [ "$3" = "install" ]; then
  echo "$@" >> "{}"
fi"#,
        args_log.display()
    ));

    repatch_cmd()
        .arg("install")
        .arg(&apk)
        .arg("--allow-downgrade")
        .env("ADB", &adb)
        .assert()
        .success();

    let logged = std::fs::read_to_string(&args_log).expect("adb should have been invoked");
    assert!(logged.contains("install -r -d"));
}

#[test]
fn test_patch_with_device_runs_install_stage() {
    let setup = TestSetup::new();
    let apk = setup.write_apk("app.apk");
    let bundle = setup.write_bundle(
        "patches.json",
        r#"[ { "name": "strip-ads" } ]"#,
    );
    let engine = setup.fake_engine(&[r#"{"event":"patch","name":"strip-ads","success":true}"#]);
    let adb = setup.fake_adb(
        r#"if [ "$1" = "devices" ]; then
  echo "List of devices attached"
  echo "emulator-5554 device"
elif [ "$1" = "-s" ] && [ "$3" = "install" ]; then
  exit 0
fi"#,
    );
    let report = setup.path().join("report.json");

    repatch_cmd()
        .arg("patch")
        .arg(&apk)
        .arg("--bundle")
        .arg(&bundle)
        .arg("--engine")
        .arg(&engine)
        .arg("--report")
        .arg(&report)
        .args([
            "--package",
            "com.example.app",
            "--unsigned",
            "--device",
        ])
        .env("ADB", &adb)
        .assert()
        .success();

    let report: serde_json::Value =
        serde_json::from_str(&setup.read_file("report.json")).expect("report should be JSON");
    let stages = report["stages"].as_array().unwrap();
    let last = stages.last().unwrap();
    assert_eq!(last["stage"], "install");
    assert_eq!(last["success"], true);
    assert!(
        last["message"]
            .as_str()
            .unwrap()
            .contains("emulator-5554")
    );
}
