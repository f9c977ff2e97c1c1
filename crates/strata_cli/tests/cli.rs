//! End-to-end tests of the `strata` binary.

use std::path::Path;
use std::process::{Command, Output};

fn strata(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_strata"))
        .current_dir(dir)
        .args(args)
        .output()
        .unwrap()
}

fn write(dir: &Path, name: &str, text: &str) {
    std::fs::write(dir.join(name), text).unwrap();
}

/// A small two-BLE project whose padding is imported rather than balanced.
fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "strata.toml",
        "[architecture]\nname = \"k6n2\"\nn = 2\n\n\
         [grid]\nwidth = 8\nheight = 8\n\n\
         [padding]\nimport_log = \"ref_padding.log\"\n",
    );
    write(
        dir.path(),
        "ref_padding.log",
        "Channel composition after padding:\n\nH1 2\nV1 1\n",
    );
    write(dir.path(), "arch.wire", "H 2 1\nV 4 1\n");
    dir
}

/// An architecture description covering every switch a two-BLE
/// composition of short wires can use.
fn prior_architecture() -> String {
    let mut text = String::from(
        "<architecture>\n    <layout>\n        <fixed_layout name=\"fix\" width=\"20\" height=\"20\">\n        </fixed_layout>\n    </layout>\n    <switchlist>\n",
    );
    let mut names = vec!["cb".to_string()];
    names.extend((1..=8).map(|l| format!("H{l}")));
    for length in [1, 2, 4, 8, 16, 32] {
        names.extend((0..4).map(|t| format!("V{length}_tap_{t}")));
    }
    for name in names {
        text.push_str(&format!(
            "        <switch type=\"mux\" name=\"{name}\" R=\"0\" Cin=\"0\" Cout=\"0\" Tdel=\"2e-11\" mux_trans_size=\"0\" buf_size=\"0\"/>\n"
        ));
    }
    text.push_str("    </switchlist>\n</architecture>\n");
    text
}

// ---------------------------------------------------------------------------
// generate
// ---------------------------------------------------------------------------

#[test]
fn generate_with_inherited_delays() {
    let dir = project();
    write(dir.path(), "prior.xml", &prior_architecture());

    let out = strata(
        dir.path(),
        &["-q", "generate", "arch.wire", "--inherit-delays", "prior.xml", "-o", "out"],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let out_dir = dir.path().join("out");
    let arch = std::fs::read_to_string(out_dir.join("k6n2.xml")).unwrap();
    assert!(arch.contains("<fixed_layout name=\"fix\" width=\"8\" height=\"8\">"));
    assert!(arch.contains("name=\"V16_tap_0\""));

    let rr = std::fs::read_to_string(out_dir.join("k6n2_rr.xml")).unwrap();
    assert!(rr.starts_with("<rr_graph"));
    assert!(rr.contains("Generated from arch file k6n2.xml"));
    assert!(rr.trim_end().ends_with("</rr_graph>"));

    let log = std::fs::read_to_string(out_dir.join("k6n2_padding.log")).unwrap();
    assert!(log.starts_with("Channel composition after padding:"));
    assert!(log.contains("H1 2\n"));
}

#[test]
fn generate_compressed_with_overrides() {
    let dir = project();
    write(dir.path(), "prior.xml", &prior_architecture());

    let out = strata(
        dir.path(),
        &[
            "-q",
            "generate",
            "arch.wire",
            "--inherit-delays",
            "prior.xml",
            "--name",
            "wide",
            "--width",
            "11",
            "--compress",
            "-o",
            "out",
        ],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let out_dir = dir.path().join("out");
    assert!(out_dir.join("wide_rr.xml.gz").is_file());
    assert!(!out_dir.join("wide_rr.xml").exists());
    let arch = std::fs::read_to_string(out_dir.join("wide.xml")).unwrap();
    assert!(arch.contains("width=\"11\" height=\"8\""));
}

#[test]
fn only_pad_writes_the_log() {
    let dir = project();
    let out = strata(dir.path(), &["-q", "generate", "arch.wire", "--only-pad", "-o", "out"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let out_dir = dir.path().join("out");
    assert!(out_dir.join("k6n2_padding.log").is_file());
    assert!(!out_dir.join("k6n2.xml").exists());
}

// ---------------------------------------------------------------------------
// failures
// ---------------------------------------------------------------------------

#[test]
fn bad_composition_aborts_without_output() {
    let dir = project();
    write(dir.path(), "bad.wire", "H 2 1\nX 4 1\n");

    let out = strata(dir.path(), &["generate", "bad.wire", "--only-pad", "-o", "out"]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("error: composition:"), "{stderr}");
    assert!(stderr.contains("unknown direction tag 'X'"), "{stderr}");
    assert!(!dir.path().join("out").exists());
}

#[test]
fn incomplete_inherited_delays_abort_without_output() {
    let dir = project();
    write(
        dir.path(),
        "prior.xml",
        "<fixed_layout name=\"fix\" width=\"8\" height=\"8\">\n<switch name=\"cb\" Tdel=\"1e-11\"/>\n</switchlist>\n",
    );

    let out = strata(
        dir.path(),
        &["generate", "arch.wire", "--inherit-delays", "prior.xml", "-o", "out"],
    );
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("error: export:"), "{stderr}");
    assert!(!dir.path().join("out").exists());
}

#[test]
fn invalid_config_is_reported() {
    let dir = project();
    write(dir.path(), "strata.toml", "[architecture]\nk = 12\n");

    let out = strata(dir.path(), &["generate", "arch.wire", "--only-pad"]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("error: configuration:"), "{stderr}");
}

// ---------------------------------------------------------------------------
// enumerate
// ---------------------------------------------------------------------------

#[test]
fn enumerate_writes_wire_files() {
    let dir = tempfile::tempdir().unwrap();
    let out = strata(
        dir.path(),
        &["-q", "enumerate", "-K", "6", "-N", "8", "--tech", "F16", "-o", "wires"],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let first = dir.path().join("wires").join("strata_0000.wire");
    let text = std::fs::read_to_string(first).unwrap();
    assert!(text.starts_with("# composition 0:"));
}

#[test]
fn enumerate_unknown_tech() {
    let dir = tempfile::tempdir().unwrap();
    let out = strata(dir.path(), &["enumerate", "--tech", "N2"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("unknown technology 'N2'"));
}
