//! Statement parser for declaration sources.
//!
//! Parsing is a single pass with one token of lookahead. Each statement
//! starts with a keyword; `flag`, `arg`, `attr`, `example` and `text` attach
//! to whatever command or topic is current, which [`Parser`] tracks as
//! arena indices rather than references.
//!
//! Optional trailing items (extra `cmd` segments, a `cmd` description, a
//! flag's short alias, the `name` tagline) are only taken from tokens that
//! start on the same line as the statement keyword.

use tracing::{debug, trace};

use crate::error::CompileError;
use crate::lexer::{Lexer, Token, TokenKind};
use crate::types::{
    AppInfo, Arg, AttrValue, CommandId, Declaration, Flag, FlagKind, HELP_FLAG, HELP_SHORT, Topic,
};

type Result<T> = std::result::Result<T, CompileError>;

/// Parses a declaration source into an unresolved tree.
///
/// Stops at the first failure.
///
/// # Examples
///
/// ```
/// use cmdtree_core::{parse, FlagKind};
///
/// let decl = parse(r#"
/// flag verbose bool "Chatty output" v
/// cmd add "Add an item"
/// arg name string "Item name"
/// "#).unwrap();
///
/// assert_eq!(decl.global_flags[0].kind, FlagKind::Bool);
/// let add = decl.find_path(&["add"]).unwrap();
/// assert_eq!(decl.command(add).args[0].name, "name");
/// ```
pub fn parse(src: &str) -> Result<Declaration> {
    Parser::new(src).parse()
}

/// Per-compilation parsing context.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: Token,
    decl: Declaration,
    current_command: Option<CommandId>,
    current_topic: Option<usize>,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str) -> Self {
        let mut lexer = Lexer::new(src);
        let lookahead = lexer.next_token();
        Self {
            lexer,
            lookahead,
            decl: Declaration::default(),
            current_command: None,
            current_topic: None,
        }
    }

    /// Consumes the source and returns the tree.
    pub fn parse(mut self) -> Result<Declaration> {
        loop {
            let token = self.advance();
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Ident(keyword) => self.statement(&keyword, token.line)?,
                TokenKind::Error(message) => {
                    return Err(CompileError::Lex {
                        line: token.line,
                        message,
                    });
                }
                other => {
                    return Err(CompileError::Syntax {
                        line: token.line,
                        expected: "statement keyword".to_string(),
                        found: other.to_string(),
                    });
                }
            }
        }

        debug!(
            commands = self.decl.command_count(),
            global_flags = self.decl.global_flags.len(),
            topics = self.decl.topics.len(),
            "parsed declaration"
        );
        Ok(self.decl)
    }

    fn statement(&mut self, keyword: &str, line: usize) -> Result<()> {
        trace!(line, keyword, "statement");
        match keyword {
            "global" => {
                self.current_command = None;
                self.current_topic = None;
                Ok(())
            }
            "cmd" => self.command(line),
            "flag" => self.flag(line),
            "arg" => self.arg(line),
            "attr" | "param" => self.attr(line),
            "name" => self.app_name(line),
            "example" => self.example(line),
            "topic" => self.topic(line),
            "text" => self.text(line),
            _ => Err(CompileError::UnknownStatement {
                line,
                keyword: keyword.to_string(),
            }),
        }
    }

    fn command(&mut self, line: usize) -> Result<()> {
        let mut segments = vec![self.expect_ident("command name")?];
        while let Some(segment) = self.optional_ident(line) {
            segments.push(segment);
        }
        let description = self.optional_string(line);

        let mut current = None;
        for segment in &segments {
            current = Some(match self.decl.child_named(current, segment) {
                Some(existing) => existing,
                None => self.decl.add_command(current, segment),
            });
        }

        if let Some(id) = current {
            if description.is_some() {
                self.decl.command_mut(id).description = description;
            }
            self.current_command = Some(id);
        }
        Ok(())
    }

    fn flag(&mut self, line: usize) -> Result<()> {
        let name = self.expect_ident("flag name")?;
        let kind_word = self.expect_ident("flag kind")?;
        let kind = kind_word
            .parse::<FlagKind>()
            .map_err(|()| CompileError::UnknownFlagKind {
                line,
                kind: kind_word.clone(),
            })?;
        let description = self.expect_string("flag description")?;

        let mut flag = Flag::new(&name, kind).with_description(&description);
        if let Some(alias) = self.optional_ident(line) {
            let mut chars = alias.chars();
            match (chars.next(), chars.next()) {
                (Some(short), None) => flag = flag.with_short(short),
                _ => return Err(CompileError::InvalidShortAlias { line, alias }),
            }
        }

        if flag.name == HELP_FLAG {
            return Err(CompileError::ReservedFlag { line, name });
        }
        if flag.short == Some(HELP_SHORT) {
            return Err(CompileError::ReservedFlag {
                line,
                name: format!("-{HELP_SHORT}"),
            });
        }

        let (scope, existing) = match self.current_command {
            Some(id) => (
                format!("command `{}`", self.decl.full_path(id)),
                &self.decl.command(id).flags,
            ),
            None => ("global flags".to_string(), &self.decl.global_flags),
        };
        for other in existing {
            let clash = if other.name == flag.name {
                Some(format!("--{}", flag.name))
            } else if other.short.is_some() && other.short == flag.short {
                flag.short.map(|c| format!("-{c}"))
            } else {
                None
            };
            if let Some(name) = clash {
                return Err(CompileError::DuplicateFlag { line, name, scope });
            }
        }

        match self.current_command {
            Some(id) => self.decl.command_mut(id).flags.push(flag),
            None => self.decl.global_flags.push(flag),
        }
        Ok(())
    }

    fn arg(&mut self, line: usize) -> Result<()> {
        let id = self.require_command(line, "arg")?;
        let name = self.expect_ident("argument name")?;
        let kind = self.expect_ident("argument kind")?;
        let description = self.expect_string("argument description")?;
        self.decl.command_mut(id).args.push(Arg {
            name,
            kind,
            description,
        });
        Ok(())
    }

    fn attr(&mut self, line: usize) -> Result<()> {
        let name = self.expect_ident("attribute name")?;
        self.expect_equals()?;

        let token = self.advance();
        let value = match token.kind {
            TokenKind::Ident(word) if word == "true" => AttrValue::Bool(true),
            TokenKind::Ident(word) if word == "false" => AttrValue::Bool(false),
            TokenKind::Str(text) => AttrValue::Str(text),
            TokenKind::Number(n) => AttrValue::Int(n),
            TokenKind::Error(message) => {
                return Err(CompileError::Lex {
                    line: token.line,
                    message,
                });
            }
            other => {
                return Err(CompileError::InvalidAttributeValue {
                    line,
                    name,
                    found: other.to_string(),
                });
            }
        };

        match self.current_command {
            Some(id) => self.decl.command_mut(id).attrs.insert(name, value),
            None => self.decl.global_attrs.insert(name, value),
        };
        Ok(())
    }

    fn app_name(&mut self, line: usize) -> Result<()> {
        if self.current_command.is_some() {
            return Err(CompileError::NameInsideCommand { line });
        }
        if self.decl.app.is_some() {
            return Err(CompileError::DuplicateAppName { line });
        }
        let name = self.expect_string("application name")?;
        let tagline = self.optional_string(line);
        self.decl.app = Some(AppInfo { name, tagline });
        Ok(())
    }

    fn example(&mut self, line: usize) -> Result<()> {
        let id = self.require_command(line, "example")?;
        let example = self.expect_string("example text")?;
        self.decl.command_mut(id).examples.push(example);
        Ok(())
    }

    fn topic(&mut self, line: usize) -> Result<()> {
        let name = self.expect_ident("topic name")?;
        let description = self.expect_string("topic description")?;
        if self.decl.find_topic(&name).is_some() {
            return Err(CompileError::DuplicateTopic { line, name });
        }
        self.decl.topics.push(Topic {
            name,
            description,
            text: None,
        });
        self.current_topic = Some(self.decl.topics.len() - 1);
        Ok(())
    }

    fn text(&mut self, line: usize) -> Result<()> {
        let Some(idx) = self.current_topic else {
            return Err(CompileError::MissingTopic { line });
        };
        let body = self.expect_string("topic text")?;
        self.decl.topics[idx].text = Some(body);
        Ok(())
    }

    fn require_command(&self, line: usize, statement: &str) -> Result<CommandId> {
        self.current_command
            .ok_or_else(|| CompileError::MissingCommand {
                line,
                statement: statement.to_string(),
            })
    }

    fn advance(&mut self) -> Token {
        let next = self.lexer.next_token();
        std::mem::replace(&mut self.lookahead, next)
    }

    fn expect_ident(&mut self, expected: &str) -> Result<String> {
        let token = self.advance();
        match token.kind {
            TokenKind::Ident(word) => Ok(word),
            kind => Err(unexpected(token.line, kind, expected)),
        }
    }

    fn expect_string(&mut self, expected: &str) -> Result<String> {
        let token = self.advance();
        match token.kind {
            TokenKind::Str(text) => Ok(text),
            kind => Err(unexpected(token.line, kind, expected)),
        }
    }

    fn expect_equals(&mut self) -> Result<()> {
        let token = self.advance();
        match token.kind {
            TokenKind::Equals => Ok(()),
            kind => Err(unexpected(token.line, kind, "`=`")),
        }
    }

    fn optional_ident(&mut self, line: usize) -> Option<String> {
        let same_line =
            matches!(self.lookahead.kind, TokenKind::Ident(_)) && self.lookahead.line == line;
        if !same_line {
            return None;
        }
        match self.advance().kind {
            TokenKind::Ident(word) => Some(word),
            _ => None,
        }
    }

    fn optional_string(&mut self, line: usize) -> Option<String> {
        let same_line =
            matches!(self.lookahead.kind, TokenKind::Str(_)) && self.lookahead.line == line;
        if !same_line {
            return None;
        }
        match self.advance().kind {
            TokenKind::Str(text) => Some(text),
            _ => None,
        }
    }
}

fn unexpected(line: usize, kind: TokenKind, expected: &str) -> CompileError {
    match kind {
        TokenKind::Error(message) => CompileError::Lex { line, message },
        other => CompileError::Syntax {
            line,
            expected: expected.to_string(),
            found: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmd_reuses_existing_nodes() {
        let decl = parse(
            r#"
cmd remote "Manage remotes"
cmd remote add "Add a remote"
flag fetch bool "Fetch after adding" f
cmd remote add
arg url string "Remote URL"
"#,
        )
        .unwrap();

        assert_eq!(decl.roots.len(), 1);
        assert_eq!(decl.command_count(), 2);
        let add = decl.find_path(&["remote", "add"]).unwrap();
        let add = decl.command(add);
        assert_eq!(add.description.as_deref(), Some("Add a remote"));
        assert_eq!(add.flags.len(), 1);
        assert_eq!(add.args.len(), 1);

        let remote = decl.find_path(&["remote"]).unwrap();
        assert_eq!(
            decl.command(remote).description.as_deref(),
            Some("Manage remotes")
        );
    }

    #[test]
    fn test_global_resets_attachment_context() {
        let decl = parse(
            r#"
cmd build
flag release bool "Optimized build"
global
flag quiet bool "Less output" q
attr safe = true
"#,
        )
        .unwrap();

        assert_eq!(decl.global_flags.len(), 1);
        assert_eq!(decl.global_flags[0].short, Some('q'));
        assert_eq!(decl.global_attrs.get("safe"), Some(&AttrValue::Bool(true)));
        let build = decl.find_path(&["build"]).unwrap();
        assert_eq!(decl.command(build).flags.len(), 1);
    }

    #[test]
    fn test_flags_before_any_command_are_global() {
        let decl = parse("flag config string \"Config path\" c\ncmd run").unwrap();
        assert_eq!(decl.global_flags[0].name, "config");
        assert_eq!(decl.global_flags[0].kind, FlagKind::String);
    }

    #[test]
    fn test_attr_values_and_param_alias() {
        let decl = parse(
            r#"
attr level = "info"
cmd run
param retries = 3
attr dry = false
"#,
        )
        .unwrap();
        let run = decl.command(decl.find_path(&["run"]).unwrap());
        assert_eq!(run.attrs.get("retries"), Some(&AttrValue::Int(3)));
        assert_eq!(run.attrs.get("dry"), Some(&AttrValue::Bool(false)));
        assert_eq!(
            decl.global_attrs.get("level"),
            Some(&AttrValue::Str("info".into()))
        );
    }

    #[test]
    fn test_name_topic_text_and_examples() {
        let decl = parse(
            r#"
name "tool" "Does things"
topic config "Configuration"
text """
    Lines
    here
"""
cmd go
example "tool go"
"#,
        )
        .unwrap();

        let app = decl.app.as_ref().unwrap();
        assert_eq!(app.name, "tool");
        assert_eq!(app.tagline.as_deref(), Some("Does things"));
        assert_eq!(decl.topics[0].text.as_deref(), Some("Lines\nhere\n"));
        let go = decl.command(decl.find_path(&["go"]).unwrap());
        assert_eq!(go.examples, vec!["tool go".to_string()]);
    }

    #[test]
    fn test_unknown_statement_reports_line() {
        let err = parse("cmd a\n\nfrob x").unwrap_err();
        assert_eq!(
            err,
            CompileError::UnknownStatement {
                line: 3,
                keyword: "frob".to_string()
            }
        );
    }

    #[test]
    fn test_arg_without_command_fails() {
        let err = parse("arg name string \"x\"").unwrap_err();
        assert!(matches!(err, CompileError::MissingCommand { line: 1, .. }));
    }

    #[test]
    fn test_text_without_topic_fails() {
        let err = parse("cmd a\ntext \"body\"").unwrap_err();
        assert_eq!(err, CompileError::MissingTopic { line: 2 });
    }

    #[test]
    fn test_name_inside_command_fails() {
        let err = parse("cmd a\nname \"x\"").unwrap_err();
        assert_eq!(err, CompileError::NameInsideCommand { line: 2 });
    }

    #[test]
    fn test_unknown_flag_kind_is_rejected() {
        let err = parse("flag count int \"How many\"").unwrap_err();
        assert_eq!(
            err,
            CompileError::UnknownFlagKind {
                line: 1,
                kind: "int".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_flag_alias_in_scope() {
        let err = parse("cmd a\nflag one bool \"\" x\nflag two bool \"\" x").unwrap_err();
        assert!(matches!(
            err,
            CompileError::DuplicateFlag { line: 3, ref name, .. } if name == "-x"
        ));
    }

    #[test]
    fn test_help_is_reserved() {
        assert!(matches!(
            parse("flag help bool \"\"").unwrap_err(),
            CompileError::ReservedFlag { .. }
        ));
        assert!(matches!(
            parse("cmd a\nflag hard bool \"\" h").unwrap_err(),
            CompileError::ReservedFlag { .. }
        ));
    }

    #[test]
    fn test_syntax_error_names_expected_token() {
        let err = parse("attr x 3").unwrap_err();
        assert_eq!(
            err,
            CompileError::Syntax {
                line: 1,
                expected: "`=`".to_string(),
                found: "number 3".to_string()
            }
        );
    }

    #[test]
    fn test_lex_error_surfaces_with_line() {
        let err = parse("cmd a\nexample \"oops").unwrap_err();
        assert_eq!(
            err,
            CompileError::Lex {
                line: 2,
                message: "unterminated string".to_string()
            }
        );
    }

    #[test]
    fn test_optional_items_stop_at_line_end() {
        let decl = parse("cmd a\nflag x bool \"d\"\ncmd b").unwrap();
        let a = decl.command(decl.find_path(&["a"]).unwrap());
        assert_eq!(a.flags[0].short, None);
        assert!(decl.find_path(&["b"]).is_some());
    }
}
