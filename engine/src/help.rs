//! Fixed help texts for shell syntax that is not part of any man page.

use crate::ast::{CompoundKind, Operator};

pub const ASSIGNMENT: &str = "Sets a variable in the environment of this command only. \
     Without a command, the variable is set in the current shell.";

pub const COMMENT: &str =
    "A word beginning with # causes that word and all remaining characters on that line to be ignored.";

pub fn operator(op: Operator) -> &'static str {
    match op {
        Operator::Pipe => {
            "A pipeline: the standard output of the command on the left is connected \
             to the standard input of the command on the right."
        }
        Operator::PipeAll => {
            "A pipeline that connects both standard output and standard error of the \
             command on the left to the standard input of the command on the right."
        }
        Operator::And => "The command on the right runs only if the command on the left succeeds.",
        Operator::Or => "The command on the right runs only if the command on the left fails.",
        Operator::Semicolon | Operator::Newline => {
            "Commands separated by ; or a newline are run sequentially; the shell waits \
             for each command to terminate in turn."
        }
        Operator::Background => {
            "The command is run asynchronously in the background; the shell does not \
             wait for it to finish."
        }
        Operator::OpenSubshell | Operator::CloseSubshell => {
            "The list is executed in a subshell. Variable assignments and builtins that \
             change the shell state do not remain in effect after it completes."
        }
        Operator::OpenBrace | Operator::CloseBrace => {
            "The list is executed in the current shell environment. It must be terminated \
             with a newline or semicolon before the closing brace."
        }
        Operator::CaseBreak => "Ends a case arm; no further patterns are tried.",
        Operator::CaseFallThrough => {
            "Ends a case arm and goes on with the next one: ;& runs its list without \
             testing the pattern, ;;& tests the remaining patterns."
        }
    }
}

const IF: &str = "if list; then list; [elif list; then list;] ... [else list;] fi\n\
     The if list is executed. If its exit status is zero, the then list is executed. \
     Otherwise each elif list is executed in turn, and if its exit status is zero the \
     corresponding then list runs. Otherwise the else list, if present, is executed.";

const WHILE: &str = "while list-1; do list-2; done\n\
     The while command continuously executes list-2 as long as the last command in \
     list-1 returns an exit status of zero.";

const UNTIL: &str = "until list-1; do list-2; done\n\
     The until command executes list-2 as long as the last command in list-1 returns \
     a non-zero exit status.";

const FOR: &str = "for name [ [ in [ word ... ] ] ; ] do list ; done\n\
     The list of words following in is expanded, and name is set to each element in \
     turn while list is executed. Without in, the positional parameters are used. \
     for (( expr1 ; expr2 ; expr3 )) evaluates expr1, then runs list while expr2 is \
     non-zero, evaluating expr3 after each run.";

const SELECT: &str = "select name [ in word ] ; do list ; done\n\
     The words are printed as a numbered menu and a line is read from standard \
     input. name is set to the chosen word and list runs, until a break command.";

const CASE: &str = "case word in [ [(] pattern [ | pattern ] ... ) list ;; ] ... esac\n\
     word is expanded and matched against each pattern in turn. The list of the \
     first matching arm is executed.";

const FUNCTION: &str = "[ function ] name () compound-command [redirection]\n\
     Defines a shell function called name. The body is executed whenever name is \
     used as a simple command.";

const NEGATION: &str = "If the reserved word ! precedes a pipeline, the exit status of \
     the pipeline is the logical negation of its exit status.";

/// Help for a reserved word or delimiter introducing a clause of a
/// compound command of `kind`.
///
/// ```
/// use shell_explain_engine::ast::CompoundKind;
/// use shell_explain_engine::help;
///
/// assert!(help::compound(CompoundKind::If, "then").contains("then list"));
/// ```
pub fn compound(kind: CompoundKind, keyword: &str) -> &'static str {
    match (kind, keyword) {
        (CompoundKind::If, "if") => IF,
        (CompoundKind::If, "then") => {
            "The then list runs if the preceding if or elif list exited with status zero."
        }
        (CompoundKind::If, "elif") => {
            "Tested when all previous conditions failed; its then list runs if it succeeds."
        }
        (CompoundKind::If, "else") => "The else list runs if no condition succeeded.",
        (CompoundKind::If, _) => "Ends the if command.",
        (CompoundKind::While, "while") => WHILE,
        (CompoundKind::Until, "until") => UNTIL,
        (CompoundKind::For, "for") => FOR,
        (CompoundKind::Select, "select") => SELECT,
        (CompoundKind::For | CompoundKind::Select, "in") => {
            "The words that name takes in turn. Each word is expanded first."
        }
        (CompoundKind::While | CompoundKind::Until | CompoundKind::For | CompoundKind::Select, "do") => {
            "The loop body: the list runs once per iteration."
        }
        (CompoundKind::While | CompoundKind::Until | CompoundKind::For | CompoundKind::Select, _) => {
            "Ends the loop."
        }
        (CompoundKind::Case, "case") => CASE,
        (CompoundKind::Case, "in") => "Begins the arms of the case command.",
        (CompoundKind::Case, "esac") => "Ends the case command.",
        (CompoundKind::Case, _) => {
            "A case arm: the list after ) runs when the word matches one of the patterns. \
             Patterns are separated by | and use the same matching rules as pathname expansion."
        }
        (CompoundKind::Function, _) => FUNCTION,
        (CompoundKind::Negation, _) => NEGATION,
    }
}

/// Help for a redirection operator as written, including any fd prefix.
pub fn redirection(op: &str) -> &'static str {
    let bare = op.trim_start_matches(|c: char| c.is_ascii_digit());
    let has_fd = bare.len() != op.len();
    match bare {
        "<" => "Redirects input: the file is opened for reading on standard input (or the given descriptor).",
        ">" if has_fd => "Redirects output of the given file descriptor to the file, truncating it.",
        ">" => "Redirects standard output to the file, creating or truncating it.",
        ">|" => "Redirects output to the file, truncating it even if the noclobber option is set.",
        ">>" => "Appends output to the end of the file, creating it if it does not exist.",
        "<>" => "Opens the file for both reading and writing.",
        "<<" | "<<-" => {
            "Here document: the following lines up to the delimiter word are fed to \
             standard input. With <<- leading tabs are stripped."
        }
        "<<<" => "Here string: the word is expanded and supplied to standard input.",
        ">&" if has_fd => "Duplicates an output file descriptor: the descriptor is made a copy of the target descriptor.",
        ">&" | "&>" => "Redirects both standard output and standard error to the target.",
        "<&" => "Duplicates an input file descriptor from the target descriptor.",
        "&>>" => "Appends both standard output and standard error to the file.",
        _ => "Redirects input or output of the command.",
    }
}
