//! Line-oriented parser for `pspace.conf`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use pspace_types::CompareOp;

use super::range::{parse_accuracy, parse_range, MAX_RANGE_VALUES};
use super::{ConfigError, Configuration, ParameterSpaceBlock, CONFIG_FILE_NAME};
use crate::arithmetic::Expr;
use crate::paths;
use crate::template::CommandTemplate;

/// Parses configuration text into a [`Configuration`].
///
/// The origin path is only used for error messages and for resolving a
/// relative `WORKDIR`; no file is read.
#[derive(Debug, Clone)]
pub struct ConfigParser {
    origin: PathBuf,
    home: PathBuf,
}

/// A `PSPACE:` block while it is being read.
#[derive(Debug)]
struct BlockBuilder {
    values: BTreeMap<String, Vec<f64>>,
    accuracy: Option<f64>,
    line: usize,
}

/// Template text and value expressions, both optional until validation.
#[derive(Debug, Default)]
struct TemplateSlot {
    template: Option<String>,
    values: Option<Vec<Expr>>,
}

impl TemplateSlot {
    fn finish(self) -> CommandTemplate {
        CommandTemplate::new(self.template.unwrap_or_default(), self.values.unwrap_or_default())
    }
}

/// Everything collected so far.
#[derive(Debug, Default)]
struct ParseState {
    pnames: Vec<String>,
    maxrun: Option<u32>,
    workdir: Option<(String, PathBuf)>,
    datafile: TemplateSlot,
    exec: TemplateSlot,
    create: TemplateSlot,
    check: TemplateSlot,
    acc: TemplateSlot,
    op: Option<CompareOp>,
    blocks: Vec<BlockBuilder>,
}

impl ParseState {
    /// Template slot for a `CMD_*`/`DATAFILE` keyword, with or without `_VALUES`.
    fn slot(&mut self, keyword: &str) -> Option<&mut TemplateSlot> {
        match keyword.strip_suffix("_VALUES").unwrap_or(keyword) {
            "DATAFILE" => Some(&mut self.datafile),
            "CMD_EXEC" => Some(&mut self.exec),
            "CMD_FILE" => Some(&mut self.create),
            "CMD_CHECKFILE" => Some(&mut self.check),
            "CMD_ACC" => Some(&mut self.acc),
            _ => None,
        }
    }
}

/// Split a list separated by commas and/or whitespace.
///
/// Separators inside parentheses do not split, so `min(J, L)` stays whole.
fn split_list(text: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if depth == 0 && (c == ',' || c.is_whitespace()) => {
                if start < i {
                    items.push(&text[start..i]);
                }
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if start < text.len() {
        items.push(&text[start..]);
    }
    items
}

/// Text before the first `#`.
fn strip_comment(line: &str) -> &str {
    line.split_once('#').map_or(line, |(before, _)| before)
}

fn leading_whitespace(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

impl ConfigParser {
    pub fn new(origin: impl Into<PathBuf>) -> Self {
        Self {
            origin: origin.into(),
            home: paths::home_dir(),
        }
    }

    /// Use `home` for `~` expansion and as the default working directory.
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }

    /// Resolve a directory or file path to its configuration file.
    ///
    /// A directory resolves to its `pspace.conf`; a file must carry that name.
    pub fn locate(path: &Path) -> Result<PathBuf, ConfigError> {
        let locate_err = |path: &Path, reason: &str| ConfigError::Locate {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            let cwd = std::env::current_dir().map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            cwd.join(path)
        };
        let absolute = paths::normalize_path(&absolute);

        if !absolute.exists() {
            return Err(locate_err(path, "no such file or directory"));
        }
        let file = if absolute.is_dir() {
            absolute.join(CONFIG_FILE_NAME)
        } else {
            absolute
        };
        if file.file_name().and_then(|n| n.to_str()) != Some(CONFIG_FILE_NAME) {
            return Err(locate_err(&file, "wrong filename"));
        }
        if !file.is_file() {
            return Err(locate_err(&file, "no such file"));
        }
        Ok(file)
    }

    /// Parse configuration text.
    pub fn parse(&self, text: &str) -> Result<Configuration, ConfigError> {
        let mut state = ParseState::default();
        let mut in_block = false;
        let mut indent: Option<usize> = None;

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            if raw.trim().is_empty() {
                continue;
            }

            // a non-indented line closes the block
            if in_block && leading_whitespace(raw) == 0 {
                in_block = false;
                indent = None;
            }

            // comment-only lines inside a block still keep the block indentation
            if in_block {
                let width = leading_whitespace(raw);
                match indent {
                    None => indent = Some(width),
                    Some(expected) if expected != width => {
                        return Err(self.syntax(line, "unexpected indent"));
                    }
                    Some(_) => {}
                }
            }

            let content = strip_comment(raw).trim();
            if content.is_empty() {
                continue;
            }

            if in_block {
                self.block_line(&mut state, content, line)?;
            } else if content == "PSPACE:" {
                state.blocks.push(BlockBuilder {
                    values: BTreeMap::new(),
                    accuracy: None,
                    line,
                });
                in_block = true;
            } else {
                self.top_line(&mut state, content, line)?;
            }
        }

        self.finish(state)
    }

    fn syntax(&self, line: usize, message: impl Into<String>) -> ConfigError {
        ConfigError::Syntax {
            file: self.origin.clone(),
            line,
            message: message.into(),
        }
    }

    fn semantic(&self, line: Option<usize>, message: impl Into<String>) -> ConfigError {
        ConfigError::Semantic {
            file: self.origin.clone(),
            line,
            message: message.into(),
        }
    }

    fn confdir(&self) -> &Path {
        self.origin.parent().unwrap_or(Path::new("/"))
    }

    fn top_line(&self, state: &mut ParseState, content: &str, line: usize) -> Result<(), ConfigError> {
        let (keyword, rest) = content
            .split_once(char::is_whitespace)
            .map_or((content, ""), |(k, r)| (k, r.trim()));

        match keyword {
            "DECLARE" => {
                let names = split_list(rest);
                if names.is_empty() {
                    return Err(self.syntax(line, "DECLARE needs at least one parameter name"));
                }
                for name in names {
                    if state.pnames.iter().any(|p| p == name) {
                        return Err(self.syntax(line, format!("parameter \"{name}\" already declared")));
                    }
                    state.pnames.push(name.to_string());
                }
            }
            "MAXRUN" => {
                let number: i64 = match split_list(rest).as_slice() {
                    [n] => n.parse().map_err(|_| self.syntax(line, "syntax error"))?,
                    _ => return Err(self.syntax(line, "syntax error")),
                };
                let number = u32::try_from(number)
                    .ok()
                    .filter(|n| *n >= 1)
                    .ok_or_else(|| self.syntax(line, "MAXRUN must be positive integer"))?;
                if state.maxrun.is_some() {
                    return Err(self.syntax(line, "MAXRUN already specified"));
                }
                state.maxrun = Some(number);
            }
            "WORKDIR" => {
                if rest.is_empty() {
                    return Err(self.syntax(line, "syntax error"));
                }
                if state.workdir.is_some() {
                    return Err(self.syntax(line, "WORKDIR already specified"));
                }
                let expanded = paths::expand_tilde(rest, &self.home);
                let resolved = paths::absolutize(&expanded, self.confdir());
                state.workdir = Some((rest.to_string(), resolved));
            }
            "CMD_ACC_OP" => {
                let op: CompareOp = rest
                    .parse()
                    .map_err(|_| self.syntax(line, "unknown comparison operator"))?;
                if state.op.is_some() {
                    return Err(self.syntax(line, "CMD_ACC_OP already specified"));
                }
                state.op = Some(op);
            }
            "PARAM" | "ACC" => {
                return Err(self.syntax(line, format!("{keyword} outside of a PSPACE block")));
            }
            _ if keyword.ends_with("_VALUES") => {
                let items = split_list(rest);
                if items.is_empty() {
                    return Err(self.syntax(line, "syntax error"));
                }
                let exprs = items
                    .into_iter()
                    .map(Expr::parse)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| self.syntax(line, e.to_string()))?;
                let slot = state
                    .slot(keyword)
                    .ok_or_else(|| self.syntax(line, "syntax error"))?;
                if slot.values.is_some() {
                    return Err(self.syntax(line, format!("{keyword} already specified")));
                }
                slot.values = Some(exprs);
            }
            _ => {
                let missing = rest.is_empty();
                let Some(slot) = state.slot(keyword) else {
                    return Err(self.syntax(line, "syntax error"));
                };
                if missing {
                    return Err(self.syntax(line, "syntax error"));
                }
                if slot.template.is_some() {
                    return Err(self.syntax(line, format!("{keyword} already specified")));
                }
                slot.template = Some(rest.to_string());
            }
        }
        Ok(())
    }

    fn block_line(&self, state: &mut ParseState, content: &str, line: usize) -> Result<(), ConfigError> {
        let Some(block) = state.blocks.last_mut() else {
            return Err(self.syntax(line, "syntax error"));
        };
        let (keyword, rest) = content
            .split_once(char::is_whitespace)
            .map_or((content, ""), |(k, r)| (k, r.trim()));

        match keyword {
            "PARAM" => {
                let items = split_list(rest);
                let [name, ranges @ ..] = items.as_slice() else {
                    return Err(self.syntax(line, "syntax error"));
                };
                if ranges.is_empty() {
                    return Err(self.syntax(line, "syntax error"));
                }
                let mut values = Vec::new();
                for item in ranges {
                    values.extend(parse_range(item).map_err(|msg| self.syntax(line, msg))?);
                    if values.len() > MAX_RANGE_VALUES {
                        return Err(self.syntax(
                            line,
                            format!("parameter \"{name}\" has too many values"),
                        ));
                    }
                }
                if block.values.contains_key(*name) {
                    return Err(self.syntax(
                        line,
                        format!("values for parameter \"{name}\" already specified in this block"),
                    ));
                }
                block.values.insert(name.to_string(), values);
            }
            "ACC" => {
                let accuracy = parse_accuracy(rest).map_err(|msg| self.syntax(line, msg))?;
                if block.accuracy.is_some() {
                    return Err(self.syntax(line, "ACC already specified in this block"));
                }
                block.accuracy = Some(accuracy);
            }
            _ => return Err(self.syntax(line, "syntax error")),
        }
        Ok(())
    }

    /// Whole-file checks and defaults.
    fn finish(&self, state: ParseState) -> Result<Configuration, ConfigError> {
        for block in &state.blocks {
            if let Some(name) = block.values.keys().find(|n| !state.pnames.contains(n)) {
                return Err(self.semantic(Some(block.line), format!("parameter \"{name}\" undeclared")));
            }
        }

        let mut blocks = Vec::with_capacity(state.blocks.len());
        for block in state.blocks {
            let accuracy = block
                .accuracy
                .ok_or_else(|| self.semantic(Some(block.line), "missing ACC in PSPACE block"))?;
            blocks.push(ParameterSpaceBlock {
                values: block.values,
                accuracy,
                line: block.line,
            });
        }

        for block in &blocks {
            if let Some(name) = state.pnames.iter().find(|n| !block.values.contains_key(*n)) {
                return Err(self.semantic(
                    Some(block.line),
                    format!("parameter \"{name}\" missing in PSPACE block"),
                ));
            }
        }

        for (keyword, slot) in [
            ("CMD_ACC", &state.acc),
            ("CMD_EXEC", &state.exec),
            ("CMD_FILE", &state.create),
            ("CMD_CHECKFILE", &state.check),
            ("DATAFILE", &state.datafile),
        ] {
            if slot.template.is_none() {
                return Err(self.semantic(None, format!("missing {keyword} specification")));
            }
        }

        let (workdir_raw, workdir) = state
            .workdir
            .unwrap_or_else(|| (String::new(), paths::normalize_path(&self.home)));

        let conf = Configuration {
            origin: self.origin.clone(),
            home: self.home.clone(),
            pnames: state.pnames,
            workdir_raw,
            workdir,
            maxrun: state.maxrun,
            datafile: state.datafile.finish(),
            exec: state.exec.finish(),
            create: state.create.finish(),
            check: state.check.finish(),
            acc: state.acc.finish(),
            op: state.op.unwrap_or_default(),
            blocks,
        };
        tracing::debug!(
            file = %conf.origin.display(),
            params = conf.pnames.len(),
            blocks = conf.blocks.len(),
            "parsed configuration"
        );
        Ok(conf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> ConfigParser {
        ConfigParser::new("/work/pspace.conf").with_home("/home/alice")
    }

    #[test]
    fn split_list_accepts_commas_and_spaces() {
        assert_eq!(split_list("a, b,c  d"), vec!["a", "b", "c", "d"]);
        assert_eq!(split_list(" , "), Vec::<&str>::new());
        assert_eq!(split_list("min(J, L),round(J*2, 1) ACC"), vec!["min(J, L)", "round(J*2, 1)", "ACC"]);
    }

    #[test]
    fn strip_comment_keeps_prefix() {
        assert_eq!(strip_comment("ACC 1e-6  # tight"), "ACC 1e-6  ");
        assert_eq!(strip_comment("# all comment"), "");
        assert_eq!(strip_comment("no comment"), "no comment");
    }

    #[test]
    fn workdir_resolves_against_config_directory() {
        let mut state = ParseState::default();
        parser().top_line(&mut state, "WORKDIR runs/../data", 1).expect("valid");
        let (raw, resolved) = state.workdir.expect("workdir set");
        assert_eq!(raw, "runs/../data");
        assert_eq!(resolved, PathBuf::from("/work/data"));
    }

    #[test]
    fn workdir_expands_home() {
        let mut state = ParseState::default();
        parser().top_line(&mut state, "WORKDIR ~/runs", 1).expect("valid");
        assert_eq!(state.workdir.map(|w| w.1), Some(PathBuf::from("/home/alice/runs")));
    }

    #[test]
    fn values_compile_expressions() {
        let mut state = ParseState::default();
        parser()
            .top_line(&mut state, "DATAFILE_VALUES round(J*10), L", 3)
            .expect("valid");
        let values = state.datafile.values.expect("values set");
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].source(), "round(J*10)");
    }

    #[test]
    fn unknown_values_directive() {
        let mut state = ParseState::default();
        let err = parser()
            .top_line(&mut state, "CMD_FOO_VALUES J", 4)
            .expect_err("unknown directive");
        assert_eq!(err.line(), Some(4));
    }
}
