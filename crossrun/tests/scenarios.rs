//! End-to-end comparisons driven through a scripted runner.
//!
//! Each test scripts the engine output per configuration and checks the
//! verdict and the report text downstream tooling reads.

use std::time::Duration;

use crossrun::compare::{Comparator, ComparisonPlan, CrashPolicy};
use crossrun::core::report::CHECK_SENTINEL;
use crossrun::core::suppression::SuppressionRegistry;
use crossrun::core::types::{Configuration, ExecutionResult};
use crossrun::core::verdict::{PassReason, Status, Verdict};
use crossrun::test_support::{
    ScriptedRunner, config, crashed, output, registry_from, timed_out,
};

fn plan() -> ComparisonPlan {
    ComparisonPlan::new("/fuzz/fuzz-1.js", Duration::from_secs(1))
}

fn pair() -> Vec<Configuration> {
    vec![
        config("interpreter", &["--no-opt"]),
        config("optimizing", &["--always-turbofan"]),
    ]
}

fn run(registry: &SuppressionRegistry, results: Vec<ExecutionResult>) -> Verdict {
    let runner = ScriptedRunner::new(results);
    let outcome = Comparator::new(registry, &runner, "/fuzz")
        .compare(pair(), "", &plan(), None)
        .expect("compare");
    assert_eq!(runner.remaining(), 0);
    outcome.verdict
}

#[test]
fn identical_runs_pass() {
    let registry = registry_from("");
    let verdict = run(&registry, vec![output("Hello\n"), output("Hello\n")]);
    assert_eq!(verdict, Verdict::Pass(PassReason::Equivalent));
    assert_eq!(verdict.render(), "# Correctness - pass\n");
}

#[test]
fn caret_noise_with_line_rule_passes() {
    let registry = registry_from(
        r#"
[[line_diff]]
id = "not-a-function"
pattern = 'TypeError: .* is not a function'
"#,
    );
    let verdict = run(
        &registry,
        vec![
            output("TypeError: x is not a function\n    ^\n"),
            output("TypeError: y is not a function\n    ^\n"),
        ],
    );
    assert_eq!(verdict.status(), Status::Pass);
}

#[test]
fn genuine_divergence_fails_with_detail() {
    let registry = registry_from("");
    let verdict = run(&registry, vec![output("42\n"), output("43\n")]);
    assert_eq!(verdict.status(), Status::Fail);

    let report = verdict.render();
    assert!(report.contains("# configs=x64,interpreter:x64,optimizing\n"));
    assert!(report.contains("# source=none\n"));
    assert!(report.contains("# suppression=\n"));
    assert!(report.contains(CHECK_SENTINEL));
    assert!(report.contains("- 42\n+ 43"));
    assert!(report.contains("### Start of configuration x64,optimizing:\n43\n"));
}

#[test]
fn divergence_after_source_marker_reports_source_key() {
    let registry = registry_from("");
    let verdict = run(
        &registry,
        vec![
            output("fuzz source: mjsunit/array.js\n1\n"),
            output("fuzz source: mjsunit/array.js\n2\n"),
        ],
    );
    let detail = verdict.detail().expect("real failure");
    assert_eq!(detail.source.as_deref(), Some("mjsunit/array.js"));
    assert_eq!(detail.source_key.len(), 3);
    assert!(verdict.render().contains("# Source file:\nmjsunit/array.js\n"));
}

#[test]
fn content_rule_drops_flag_and_auxiliary_config() {
    let registry = registry_from(
        r#"
[[drop_flag_on_content]]
flag = "--jitless"
pattern = 'WebAssembly\.'
"#,
    );
    let configs = vec![
        config("interpreter", &["--no-opt", "--jitless"]),
        config("optimizing", &["--always-turbofan", "--jitless"]),
        config("jitless", &["--jitless"]),
    ];
    let runner = ScriptedRunner::new(vec![output("ok\n"), output("ok\n")]);
    let outcome = Comparator::new(&registry, &runner, "/fuzz")
        .compare(configs, "new WebAssembly.Module(bytes);\n", &plan(), None)
        .expect("compare");

    assert_eq!(outcome.verdict, Verdict::Pass(PassReason::Equivalent));
    assert_eq!(outcome.log.len(), 3);
    let requests = runner.requests();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert!(!request.argv.iter().any(|arg| arg == "--jitless"));
    }
    assert_eq!(requests[0].argv[1], "--no-opt");
    assert_eq!(requests[1].argv[1], "--always-turbofan");
}

#[test]
fn crash_truncation_is_not_an_extra_line_difference() {
    let registry = registry_from("");

    // A crashed baseline ends the comparison before the second run.
    let verdict = run(&registry, vec![crashed("abc\n")]);
    assert_eq!(
        verdict,
        Verdict::Pass(PassReason::Crashed {
            config: "x64,interpreter".to_string()
        })
    );

    let runner = ScriptedRunner::new(vec![crashed("abc\n"), output("abc\ndef\nghi")]);
    let outcome = Comparator::new(&registry, &runner, "/fuzz")
        .compare(
            pair(),
            "",
            &plan().with_crash_policy(CrashPolicy::Compare),
            None,
        )
        .expect("compare");
    assert_eq!(
        outcome.verdict,
        Verdict::Pass(PassReason::CrashedWithoutDifference)
    );
}

#[test]
fn ignored_lines_are_stripped_before_crash_capping() {
    let registry = registry_from("ignore_lines = ['^Warning: .*$']\n");
    let runner = ScriptedRunner::new(vec![
        crashed("1\n"),
        output("Warning: x is deprecated\n1\n2\n"),
    ]);
    let outcome = Comparator::new(&registry, &runner, "/fuzz")
        .compare(
            pair(),
            "",
            &plan().with_crash_policy(CrashPolicy::Compare),
            None,
        )
        .expect("compare");

    // Capping the raw output to the crashed run's two bytes would leave "Wa".
    assert_eq!(
        outcome.verdict,
        Verdict::Pass(PassReason::CrashedWithoutDifference)
    );
}

#[test]
fn ignored_lines_never_cause_differences() {
    let registry = registry_from("ignore_lines = ['^Warning: .*$']\n");
    let verdict = run(
        &registry,
        vec![output("Warning: flag is deprecated\n1\n"), output("1\n")],
    );
    assert_eq!(verdict, Verdict::Pass(PassReason::Equivalent));
}

#[test]
fn content_suppression_skips_every_run() {
    let registry = registry_from(
        r#"
content_start_marker = 'print("start");'

[[content]]
bug = "bug-regexp"
pattern = 'RegExp\('
"#,
    );
    let runner = ScriptedRunner::new(Vec::new());
    let comparator = Comparator::new(&registry, &runner, "/fuzz");

    // Matches before the marker do not count, so the runs start (and the
    // empty script errors).
    let result = comparator.compare(pair(), "RegExp(x);\nprint(\"start\");\n", &plan(), None);
    assert!(result.is_err());
    assert_eq!(runner.requests().len(), 1);

    let outcome = comparator
        .compare(pair(), "print(\"start\");\nRegExp(x);\n", &plan(), None)
        .expect("compare");
    assert_eq!(outcome.verdict.suppression(), Some("bug-regexp"));
    assert!(outcome.verdict.render().contains("# suppression=bug-regexp\n"));
}

#[test]
fn architecture_scoped_output_rule() {
    let registry = registry_from(
        r#"
[[output]]
bug = "arm-only"
scope = "arm64"
pattern = '^NaN$'
"#,
    );
    let mut arm = config("optimizing", &["--always-turbofan"]);
    arm.arch = "arm64".to_string();
    let configs = vec![config("interpreter", &[]), arm];

    let runner = ScriptedRunner::new(vec![output("0\n"), output("NaN\n")]);
    let outcome = Comparator::new(&registry, &runner, "/fuzz")
        .compare(configs, "", &plan(), None)
        .expect("compare");
    assert_eq!(outcome.verdict.suppression(), Some("arm-only"));

    // The same output on x64 is a real difference.
    let verdict = run(&registry, vec![output("0\n"), output("NaN\n")]);
    assert!(verdict.detail().is_some());
}

#[test]
fn baseline_output_marker_switches_to_fallbacks() {
    let registry = registry_from(
        r#"
[[fallback_on_output]]
id = "arch-specific"
pattern = '^arch specific$'
"#,
    );
    let mut cross = config("optimizing", &["--always-turbofan"]);
    cross.arch = "arm64".to_string();
    cross.executable = "/arm64/d8".into();
    let configs = vec![
        config("interpreter", &[]),
        cross.with_fallback(config("optimizing", &["--always-turbofan"])),
    ];

    let runner = ScriptedRunner::new(vec![output("arch specific\n"), output("arch specific\n")]);
    let outcome = Comparator::new(&registry, &runner, "/fuzz")
        .compare(configs, "", &plan(), None)
        .expect("compare");
    assert_eq!(outcome.verdict.status(), Status::Pass);
    assert_eq!(outcome.log.len(), 1);
    assert_eq!(runner.requests()[1].argv[0], "/engine/d8");
}

#[test]
fn timeout_in_comparison_passes() {
    let registry = registry_from("");
    let verdict = run(&registry, vec![output("1\n"), timed_out()]);
    assert_eq!(
        verdict.render(),
        "# Correctness - T-I-M-E-O-U-T x64,optimizing\n"
    );
}
