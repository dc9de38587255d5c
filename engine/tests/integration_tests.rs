use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use shell_explain_core::{LookupError, ManArgument, ManOption, ManPage, ManPageLookup};
use shell_explain_engine::ast::{CompoundKind, ExpansionKind};
use shell_explain_engine::{
    AnnotationKind, Engine, EngineOptions, ExplainedNode, ManPageCache, ManPageRef, MatchKind,
    OptionValue, OutputFormat, SyntaxError, UnresolvedReason, format_explanation, help, parse,
    reconstruct,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// In-memory lookup that counts every call per name.
#[derive(Default)]
struct FakeLookup {
    pages: HashMap<String, ManPage>,
    failing: Vec<String>,
    calls: AtomicUsize,
    per_name: Mutex<HashMap<String, usize>>,
}

impl FakeLookup {
    fn with(mut self, page: ManPage) -> Self {
        self.pages.insert(page.name.clone(), page);
        self
    }

    fn failing(mut self, name: &str) -> Self {
        self.failing.push(name.to_string());
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn calls_for(&self, name: &str) -> usize {
        self.per_name.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}

impl ManPageLookup for FakeLookup {
    fn get_manpage(&self, name: &str) -> Result<Option<ManPage>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.per_name.lock().unwrap().entry(name.to_string()).or_default() += 1;
        if self.failing.iter().any(|n| n == name) {
            return Err(LookupError::Backend("connection refused".into()));
        }
        Ok(self.pages.get(name).cloned())
    }
}

fn ls_page() -> ManPage {
    ManPage::new("ls", "1")
        .with_synopsis("ls - list directory contents")
        .with_option(ManOption::flag(&["-l"], &[], "long format"))
        .with_option(ManOption::flag(&["-a"], &["--all"], "show hidden"))
}

fn grep_page() -> ManPage {
    ManPage::new("grep", "1")
        .with_synopsis("grep - print lines that match patterns")
        .with_option(ManOption::flag(&["-i"], &["--ignore-case"], "ignore case"))
        .with_option(ManOption::with_arg(&[], &["--color", "--colour"], "colorize"))
}

fn git_pages() -> Vec<ManPage> {
    let mut git = ManPage::new("git", "1").with_synopsis("git - the stupid content tracker");
    git.multi_command = true;
    let commit = ManPage::new("git-commit", "1")
        .with_synopsis("git-commit - Record changes to the repository")
        .with_option(ManOption::with_arg(&["-m"], &["--message"], "use the given message"));
    vec![git, commit]
}

fn sudo_page() -> ManPage {
    let mut sudo = ManPage::new("sudo", "8")
        .with_synopsis("sudo - execute a command as another user")
        .with_option(ManOption::with_arg(&["-u"], &["--user"], "run as user"))
        .with_argument(ManArgument::new("COMMAND", "command to run"));
    sudo.nested_command = true;
    sudo
}

fn lookup() -> FakeLookup {
    let mut lookup = FakeLookup::default().with(ls_page()).with(grep_page()).with(sudo_page());
    for page in git_pages() {
        lookup = lookup.with(page);
    }
    lookup
}

fn kinds(matches: &[shell_explain_engine::MatchResult]) -> Vec<MatchKind> {
    matches.iter().map(|m| m.kind.clone()).collect()
}

fn option(spelling: &str) -> MatchKind {
    MatchKind::Option {
        spelling: spelling.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Documented examples
// ---------------------------------------------------------------------------

#[test]
fn test_ls_cluster_and_positional() {
    let cache = ManPageCache::new();
    let engine = Engine::new(lookup(), &cache);
    let explanation = engine.explain("ls -la /tmp").unwrap();

    let commands = explanation.commands();
    assert_eq!(commands.len(), 1);
    assert!(commands[0].is_documented());
    assert_eq!(
        kinds(&commands[0].matches),
        vec![option("-l"), option("-a"), MatchKind::Unknown]
    );
    assert_eq!(commands[0].matches[2].token.text, "/tmp");
}

#[test]
fn test_grep_inline_value() {
    let cache = ManPageCache::new();
    let engine = Engine::new(lookup(), &cache);
    let explanation = engine.explain("grep --color=auto foo").unwrap();

    let grep = explanation.commands()[0];
    assert_eq!(grep.matches.len(), 2);
    assert_eq!(grep.matches[0].kind, option("--color"));
    match &grep.matches[0].value {
        Some(OptionValue::Inline(value)) => assert_eq!(value.text, "auto"),
        other => panic!("expected inline value, got {other:?}"),
    }
    assert_eq!(grep.matches[1].kind, MatchKind::Unknown);
    assert_eq!(grep.matches[1].token.text, "foo");
}

#[test]
fn test_unresolved_pipeline() {
    let cache = ManPageCache::new();
    let engine = Engine::new(lookup(), &cache);
    let explanation = engine.explain("foo -x | bar y z").unwrap();

    assert_eq!(explanation.entries.len(), 2);
    assert_eq!(
        explanation.entries[0]
            .separator
            .as_ref()
            .map(|s| s.token.text.as_str()),
        Some("|")
    );
    for cmd in explanation.commands() {
        assert_eq!(
            cmd.manpage,
            ManPageRef::Unknown {
                reason: UnresolvedReason::NotFound
            }
        );
        assert!(cmd.matches.iter().all(|m| m.kind == MatchKind::Unknown));
    }
    assert_eq!(explanation.commands()[1].matches.len(), 2);
}

#[test]
fn test_unterminated_quote_is_syntax_error() {
    let cache = ManPageCache::new();
    let lookup = lookup();
    let engine = Engine::new(&lookup, &cache);
    let err = engine.explain("echo \"unterminated").unwrap_err();
    assert_eq!(err, SyntaxError::UnterminatedQuote { quote: '"', pos: 5 });
    assert_eq!(lookup.calls(), 0);
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[test]
fn test_each_name_resolved_once_per_request() {
    let cache = ManPageCache::new();
    let lookup = lookup();
    let engine = Engine::new(&lookup, &cache);
    engine
        .explain("ls -l; ls -a && missing | missing; /bin/ls")
        .unwrap();
    assert_eq!(lookup.calls_for("ls"), 1);
    assert_eq!(lookup.calls_for("missing"), 1);
    assert_eq!(lookup.calls(), 2);
}

#[test]
fn test_cache_survives_requests_but_failures_do_not() {
    let cache = ManPageCache::new();
    let lookup = lookup().failing("flaky");
    let engine = Engine::new(&lookup, &cache);

    engine.explain("ls; flaky").unwrap();
    let explanation = engine.explain("ls; flaky").unwrap();

    assert_eq!(lookup.calls_for("ls"), 1);
    assert_eq!(lookup.calls_for("flaky"), 2);
    assert!(matches!(
        &explanation.commands()[1].manpage,
        ManPageRef::Unknown { reason: UnresolvedReason::LookupFailed(_) }
    ));
}

#[test]
fn test_lookup_failure_degrades_single_command() {
    let cache = ManPageCache::new();
    let engine = Engine::new(lookup().failing("grep"), &cache);
    let explanation = engine.explain("grep -i x | ls -l").unwrap();

    let commands = explanation.commands();
    assert!(!commands[0].is_documented());
    assert!(commands[0].matches.iter().all(|m| m.kind == MatchKind::Unknown));
    assert_eq!(kinds(&commands[1].matches), vec![option("-l")]);
}

#[test]
fn test_multi_command_page() {
    let cache = ManPageCache::new();
    let engine = Engine::new(lookup(), &cache);
    let explanation = engine.explain("git commit -m 'fix it'").unwrap();

    let git = explanation.commands()[0];
    assert_eq!(git.subcommand.as_ref().map(|t| t.text.as_str()), Some("commit"));
    match &git.manpage {
        ManPageRef::Documented(page) => assert_eq!(page.name, "git-commit"),
        other => panic!("expected git-commit, got {other:?}"),
    }
    assert_eq!(git.matches.len(), 1);
    assert!(matches!(&git.matches[0].value, Some(OptionValue::Separate(v)) if v.text == "fix it"));
}

#[test]
fn test_multi_command_without_subpage_falls_back() {
    let cache = ManPageCache::new();
    let engine = Engine::new(lookup(), &cache);
    let explanation = engine.explain("git frobnicate").unwrap();

    let git = explanation.commands()[0];
    assert!(git.subcommand.is_none());
    assert!(matches!(&git.manpage, ManPageRef::Documented(p) if p.name == "git"));
}

#[test]
fn test_nested_command() {
    let cache = ManPageCache::new();
    let engine = Engine::new(lookup(), &cache);
    let explanation = engine.explain("sudo -u root ls -la").unwrap();

    let sudo = explanation.commands()[0];
    assert_eq!(kinds(&sudo.matches), vec![option("-u")]);
    let nested = sudo.nested.as_ref().expect("nested command");
    assert_eq!(nested.name.as_ref().map(|t| t.text.as_str()), Some("ls"));
    assert_eq!(kinds(&nested.matches), vec![option("-l"), option("-a")]);
    assert_eq!(explanation.command_count(), 1);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn test_explain_is_deterministic() {
    let cache = ManPageCache::new();
    let engine = Engine::new(lookup(), &cache);
    let line = "FOO=1 ls -la /tmp 2>/dev/null | grep -i --colour=never x && (sudo ls) # done";
    assert_eq!(engine.explain(line).unwrap(), engine.explain(line).unwrap());
}

#[test]
fn test_one_entry_per_simple_command() {
    let cache = ManPageCache::new();
    let engine = Engine::new(FakeLookup::default(), &cache);
    for line in [
        "a",
        "a | b",
        "a; b && c || d &",
        "(a; b) | { c; }",
        "x=1; >f; a",
        "if a; then b; elif c; then d; else e; fi",
        "while a; do b; done | c",
        "f() { a; b; }",
        "case x in y) a;; *) b;; esac",
    ] {
        let list = parse(line).unwrap();
        let explanation = engine.explain(line).unwrap();
        assert_eq!(
            explanation.command_count(),
            list.simple_commands().len(),
            "{line}"
        );
    }
}

#[test]
fn test_reconstruct_is_lossless_over_token_text() {
    for (line, expected) in [
        ("ls -la /tmp", "ls -la /tmp"),
        ("echo fo\"o\" 'b'ar", "echo foo bar"),
        ("a|b&&c", "a | b && c"),
        ("cat <in >>out 2>&1", "cat < in >> out 2>& 1"),
        ("{ ls; }", "{ ls ; }"),
        ("if a; then b; fi", "if a ; then b ; fi"),
    ] {
        assert_eq!(reconstruct(&parse(line).unwrap()), expected);
    }
}

#[test]
fn test_exact_spelling_tie_break() {
    let find = ManPage::new("find", "1")
        .with_option(ManOption::flag(&[], &["-name"], "base of file name"))
        .with_option(ManOption::flag(&["-n"], &[], "n"))
        .with_option(ManOption::flag(&["-a"], &[], "a"))
        .with_option(ManOption::flag(&["-m"], &[], "m"))
        .with_option(ManOption::flag(&["-e"], &[], "e"));
    let cache = ManPageCache::new();
    let engine = Engine::new(FakeLookup::default().with(find), &cache);

    let explanation = engine.explain("find -name -nema").unwrap();
    let matches = &explanation.commands()[0].matches;
    assert_eq!(
        kinds(matches),
        vec![option("-name"), option("-n"), option("-e"), option("-m"), option("-a")]
    );
}

#[test]
fn test_inline_value_on_flag_is_unknown() {
    let cache = ManPageCache::new();
    let engine = Engine::new(lookup(), &cache);
    let explanation = engine.explain("ls --all=foo").unwrap();
    let ls = explanation.commands()[0];
    assert_eq!(kinds(&ls.matches), vec![MatchKind::Unknown]);
    assert!(ls.matches[0].value.is_none());
}

// ---------------------------------------------------------------------------
// Compound commands, here documents, substitutions
// ---------------------------------------------------------------------------

#[test]
fn test_reserved_words_are_shell_syntax() {
    let cache = ManPageCache::new();
    let lookup = lookup();
    let engine = Engine::new(&lookup, &cache);
    let explanation = engine.explain("if ls; then ls -l; fi").unwrap();

    let commands = explanation.commands();
    assert_eq!(commands.len(), 2);
    assert!(commands.iter().all(|c| c.is_documented()));
    assert_eq!(kinds(&commands[1].matches), vec![option("-l")]);
    assert_eq!(lookup.calls_for("ls"), 1);
    assert_eq!(lookup.calls_for("if"), 0);
    assert_eq!(lookup.calls_for("fi"), 0);

    let ExplainedNode::Compound(compound) = &explanation.entries[0].node else {
        panic!("expected a compound command");
    };
    assert_eq!(compound.kind, CompoundKind::If);
    assert_eq!(compound.clauses[0].keywords[0].help, help::compound(CompoundKind::If, "if"));
    let shell: Vec<String> = explanation
        .annotations()
        .into_iter()
        .filter(|a| a.kind == AnnotationKind::Shell)
        .map(|a| a.text)
        .collect();
    assert_eq!(shell, vec!["if", ";", "then", ";", "fi"]);

    let json = format_explanation(&explanation, OutputFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["entries"][0]["node"]["type"], "compound");
    assert_eq!(value["entries"][0]["node"]["kind"], "if");
}

#[test]
fn test_function_and_case_bodies_are_explained() {
    let cache = ManPageCache::new();
    let engine = Engine::new(lookup(), &cache);
    for line in [
        "f() { ls -l; }",
        "function f { ls -l; }",
        "function f() ( ls -l )",
        "case x in a) ls -l;; esac",
        "case $1 in (a|b) ls -l ;; *) ;; esac",
        "for f in *; do ls -l $f; done",
        "! ls -l",
    ] {
        let explanation = engine.explain(line).unwrap();
        let commands = explanation.commands();
        assert_eq!(commands.len(), 1, "{line}");
        assert!(commands[0].is_documented(), "{line}");
        assert_eq!(commands[0].matches[0].kind, option("-l"), "{line}");
    }
}

#[test]
fn test_here_document_body_is_not_a_command() {
    let cache = ManPageCache::new();
    let lookup = lookup();
    let engine = Engine::new(&lookup, &cache);
    let explanation = engine.explain("cat <<EOF\nls -l\nEOF").unwrap();

    assert_eq!(explanation.command_count(), 1);
    assert_eq!(lookup.calls_for("ls"), 0);
    let redirection = &explanation.commands()[0].redirections[0];
    assert_eq!(redirection.target.text, "EOF");
    assert_eq!(redirection.body.as_ref().map(|t| t.text.as_str()), Some("ls -l\n"));
}

#[test]
fn test_command_substitution_is_explained() {
    let cache = ManPageCache::new();
    let lookup = lookup();
    let engine = Engine::new(&lookup, &cache);
    let line = "ls $(grep -i x f)";
    let explanation = engine.explain(line).unwrap();

    assert_eq!(explanation.command_count(), 2);
    assert_eq!(lookup.calls_for("grep"), 1);
    assert_eq!(explanation.substitutions.len(), 1);
    assert_eq!(explanation.substitutions[0].kind, ExpansionKind::CommandSubstitution);

    let grep = explanation.commands()[1];
    assert!(grep.is_documented());
    assert_eq!(grep.name.as_ref().map(|t| t.raw(line)), Some("grep"));
    assert_eq!(kinds(&grep.matches), vec![option("-i"), MatchKind::Unknown, MatchKind::Unknown]);

    let texts: Vec<String> = explanation.annotations().into_iter().map(|a| a.text).collect();
    assert_eq!(texts, vec!["ls", "$(grep -i x f)", "grep", "-i", "x", "f"]);
}

#[test]
fn test_substitutions_share_the_request_resolver() {
    let cache = ManPageCache::new();
    let lookup = lookup();
    let engine = Engine::new(&lookup, &cache);
    let explanation = engine
        .explain("ls \"$(ls $(ls -a))\" <(ls -l) `ls`")
        .unwrap();

    assert_eq!(explanation.command_count(), 5);
    assert_eq!(explanation.substitutions.len(), 4);
    assert!(explanation.commands().iter().all(|c| c.is_documented()));
    assert_eq!(lookup.calls_for("ls"), 1);
}

#[test]
fn test_substitution_syntax_errors() {
    let cache = ManPageCache::new();
    let engine = Engine::new(lookup(), &cache);
    assert_eq!(
        engine.explain("echo $(ls |)"),
        Err(SyntaxError::DanglingOperator { op: "|".into(), pos: 10 })
    );
    let explanation = engine.explain(r"echo $(echo $'it\'s')").unwrap();
    assert_eq!(explanation.substitutions.len(), 1);
    assert_eq!(explanation.command_count(), 2);
}

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

#[test]
fn test_long_input_is_truncated() {
    let cache = ManPageCache::new();
    let engine = Engine::with_options(
        lookup(),
        &cache,
        EngineOptions {
            max_command_length: 5,
            ..EngineOptions::default()
        },
    );
    let explanation = engine.explain("ls -l -a -a -a").unwrap();
    assert_eq!(explanation.source, "ls -l");
    assert_eq!(explanation.commands()[0].matches.len(), 1);
}

#[test]
fn test_truncation_respects_char_boundaries() {
    let cache = ManPageCache::new();
    let engine = Engine::with_options(
        FakeLookup::default(),
        &cache,
        EngineOptions {
            max_command_length: 6,
            ..EngineOptions::default()
        },
    );
    let explanation = engine.explain("echo ééé").unwrap();
    assert_eq!(explanation.source, "echo ");
}

#[test]
fn test_nesting_limit() {
    let cache = ManPageCache::new();
    let engine = Engine::with_options(
        FakeLookup::default(),
        &cache,
        EngineOptions {
            max_nesting_depth: 1,
            ..EngineOptions::default()
        },
    );
    assert!(engine.explain("(ls)").is_ok());
    assert!(matches!(
        engine.explain("((ls))"),
        Err(SyntaxError::NestingTooDeep { limit: 1, .. })
    ));
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn test_parallel_requests_share_cache() {
    let cache = ManPageCache::new();
    let lookup = lookup();
    let engine = Engine::new(&lookup, &cache);

    let lines: Vec<String> = (0..64)
        .map(|i| format!("ls -l{} | grep -i x{i}", if i % 2 == 0 { "a" } else { "" }))
        .collect();
    let explained: Vec<_> = lines
        .par_iter()
        .map(|line| engine.explain(line).unwrap())
        .collect();

    assert_eq!(explained.len(), 64);
    assert!(explained.iter().all(|e| e.commands().iter().all(|c| c.is_documented())));
    assert_eq!(cache.len(), 2);
    // Concurrent misses may each reach the lookup; each request at most once.
    assert!(lookup.calls_for("ls") >= 1 && lookup.calls_for("ls") <= 64);
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[test]
fn test_text_output_lists_tokens() {
    let cache = ManPageCache::new();
    let engine = Engine::new(lookup(), &cache);
    let explanation = engine.explain("ls -la > out").unwrap();
    let text = format_explanation(&explanation, OutputFormat::Text).unwrap();

    assert!(text.contains("list directory contents"));
    assert!(text.contains("long format"));
    assert!(text.contains("show hidden"));
    assert!(text.contains(">out"));
    assert!(matches!(
        explanation.entries[0].node,
        ExplainedNode::Command(ref c) if c.redirections.len() == 1
    ));
}
