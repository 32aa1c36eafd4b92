use anyhow::{Context, anyhow, bail};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

static EXPECTED_STDOUT_FILE: &str = "expected-stdout";
static EXPECTED_REPLAY_LOG_FILE: &str = "expected-replay-log";
static REPLAY_LOG_FILE: &str = "replay-log.json";

struct TestCase {
    dir: PathBuf,
    name: String,
    args: String,
    expected_stdout: Option<String>,
    expected_replay_log: Option<String>,
}

impl TestCase {
    fn load(dir: PathBuf) -> anyhow::Result<Self> {
        let args_path = dir.join("args");
        let args = fs::read_to_string(&args_path)
            .with_context(|| format!("no `args` file found at `{}`", args_path.display()))?;

        Ok(Self {
            name: dir.display().to_string(),
            expected_stdout: read_expectation(&dir, EXPECTED_STDOUT_FILE)?,
            expected_replay_log: read_expectation(&dir, EXPECTED_REPLAY_LOG_FILE)?,
            args,
            dir,
        })
    }
}

/// Reads a persisted expectation, if it was already bootstrapped
fn read_expectation(dir: &Path, file_name: &str) -> anyhow::Result<Option<String>> {
    let path = dir.join(file_name);
    if !path.is_file() {
        return Ok(None);
    }

    fs::read_to_string(&path)
        .map(Some)
        .with_context(|| format!("failed to read `{}`", path.display()))
}

#[derive(Parser, Debug)]
#[command(about = "Runs wan-workbench against the stored golden expectations")]
struct GoldenOpt {
    /// Store the current output as the expectation of cases that have none yet
    #[arg(long)]
    bootstrap: bool,
}

fn main() -> anyhow::Result<()> {
    let options = GoldenOpt::parse();
    let entries =
        fs::read_dir("golden-tests/tests").context("golden tests root directory not found")?;
    let mut test_dirs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            test_dirs.push(path);
        } else {
            println!(
                "skipping path `{}` because it's not a directory",
                path.display()
            );
        }
    }

    // Stable order, regardless of the file system
    test_dirs.sort();

    let mut errored = false;
    for dir in test_dirs {
        let test_case = TestCase::load(dir)?;
        let name = test_case.name.clone();
        if let Err(e) = run_wan_workbench(test_case, options.bootstrap) {
            println!("Error running golden test `{name}`");
            match e {
                TestError::Internal(e) => println!("{e:?}"),
                TestError::MissingExpectations(files) => println!(
                    "No stored expectation for {}, rerun with `--bootstrap` to create it",
                    files.join(" and ")
                ),
                TestError::Compare(e) => {
                    if let Some(diff) = e.replay_log_diff {
                        println!("Expected replay log differs from actual replay log:\n{diff}\n");
                    }

                    if let Some(diff) = e.stdout_diff {
                        println!("Expected stdout differs from actual stdout:\n{diff}");
                    }
                }
            }
            errored = true;
        } else {
            println!("{name}: ✅");
        }
    }

    if errored {
        bail!("one or more golden tests failed");
    }

    Ok(())
}

enum TestError {
    Internal(anyhow::Error),
    MissingExpectations(Vec<&'static str>),
    Compare(CompareError),
}

struct CompareError {
    stdout_diff: Option<String>,
    replay_log_diff: Option<String>,
}

#[derive(Debug, PartialEq)]
enum Comparison {
    Matches,
    Differs(String),
    Missing,
}

fn compare(expected: Option<&str>, actual: &str) -> Comparison {
    match expected {
        Some(expected) if expected == actual => Comparison::Matches,
        Some(expected) => Comparison::Differs(diff::diff_to_string(expected, actual)),
        None => Comparison::Missing,
    }
}

fn run_wan_workbench(test_case: TestCase, bootstrap: bool) -> Result<(), TestError> {
    let workbench_args = test_case.args.split_whitespace();
    let output = Command::new("cargo")
        .arg("run")
        .arg("--release")
        .arg("--bin")
        .arg("wan-workbench")
        .arg("--")
        .args(workbench_args)
        .output()
        .context("failed to launch wan-workbench")
        .map_err(TestError::Internal)?;

    if !output.status.success() {
        return Err(TestError::Internal(anyhow!(
            "wan-workbench exited with {}:\n{}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let replay_log = fs::read_to_string(REPLAY_LOG_FILE)
        .with_context(|| format!("failed to read {REPLAY_LOG_FILE}"))
        .map_err(TestError::Internal)?;

    let mut missing = Vec::new();
    let mut check = |file_name: &'static str,
                     expected: Option<&str>,
                     actual: &str|
     -> Result<Option<String>, TestError> {
        match compare(expected, actual) {
            Comparison::Matches => Ok(None),
            Comparison::Differs(diff) => Ok(Some(diff)),
            Comparison::Missing if bootstrap => {
                fs::write(test_case.dir.join(file_name), actual.as_bytes())
                    .with_context(|| format!("failed to persist `{file_name}`"))
                    .map_err(TestError::Internal)?;
                println!("bootstrapped `{file_name}` for `{}`", test_case.name);
                Ok(None)
            }
            Comparison::Missing => {
                missing.push(file_name);
                Ok(None)
            }
        }
    };

    let stdout_diff = check(
        EXPECTED_STDOUT_FILE,
        test_case.expected_stdout.as_deref(),
        &*stdout,
    )?;
    let replay_log_diff = check(
        EXPECTED_REPLAY_LOG_FILE,
        test_case.expected_replay_log.as_deref(),
        replay_log.as_str(),
    )?;

    if !missing.is_empty() {
        return Err(TestError::MissingExpectations(missing));
    }

    if stdout_diff.is_some() || replay_log_diff.is_some() {
        Err(TestError::Compare(CompareError {
            stdout_diff,
            replay_log_diff,
        }))
    } else {
        Ok(())
    }
}

mod diff {
    use console::{Style, style};
    use similar::{ChangeTag, TextDiff};
    use std::fmt::{self, Write};

    struct Line(Option<usize>);

    impl fmt::Display for Line {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            match self.0 {
                None => write!(f, "    "),
                Some(idx) => write!(f, "{:<4}", idx + 1),
            }
        }
    }

    pub fn diff_to_string(old: &str, new: &str) -> String {
        let mut output = String::new();
        let diff = TextDiff::from_lines(old, new);

        for (idx, group) in diff.grouped_ops(3).iter().enumerate() {
            if idx > 0 {
                _ = writeln!(output, "{:-^1$}", "-", 80);
            }
            for op in group {
                for change in diff.iter_inline_changes(op) {
                    let (sign, s) = match change.tag() {
                        ChangeTag::Delete => ("-", Style::new().red()),
                        ChangeTag::Insert => ("+", Style::new().green()),
                        ChangeTag::Equal => (" ", Style::new().dim()),
                    };
                    _ = write!(
                        output,
                        "{}{} |{}",
                        style(Line(change.old_index())).dim(),
                        style(Line(change.new_index())).dim(),
                        s.apply_to(sign).bold(),
                    );
                    for (emphasized, value) in change.iter_strings_lossy() {
                        if emphasized {
                            _ = write!(output, "{}", s.apply_to(value).underlined().on_black());
                        } else {
                            _ = write!(output, "{}", s.apply_to(value));
                        }
                    }
                    if change.missing_newline() {
                        _ = writeln!(output);
                    }
                }
            }
        }

        output
    }
}
