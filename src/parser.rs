//! Parser for the signal language
//!
//! Line-oriented surface syntax:
//!
//! ```text
//! // controls, in declaration order
//! ~gain: slider "Gain" 0.5 0.0 1.0
//! ~mute: checkbox "Mute"
//!
//! // signal buses and the output
//! ~lfo: sin 0.5 >> mul 0.5 >> add 0.5
//! out: in 0 >> lpf 1200 0.7 >> mul ~gain >> meter "Level" 0 1
//! ```
//!
//! Tokenizer and parser are hand-rolled; arguments are space-separated
//! numbers or `~name` references, chains link stages with `>>`, and `+`
//! mixes two chains.

use crate::diagnostics::CompileError;
use crate::program::{
    Arg, Chain, ControlDef, Expr, ProgramDef, Source, Stage, Statement, Waveform, WidgetKind,
};

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ref(String),   // ~name
    Ident(String), // bare word
    Number(f64),
    Str(String), // "label"
    Colon,
    Chain, // >>
    Plus,
    Comma,
    Newline,
    Eof,
}

#[derive(Debug, Clone)]
struct Lexed {
    tok: Tok,
    line: usize,
    col: usize,
}

struct Tokenizer {
    input: Vec<char>,
    position: usize,
    line: usize,
    col: usize,
}

impl Tokenizer {
    fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            col: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        if self.current() == Some('\n') {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.position += 1;
    }

    fn skip_blanks(&mut self) {
        loop {
            match self.current() {
                Some(ch) if ch.is_whitespace() && ch != '\n' => self.advance(),
                Some('/') if self.peek() == Some('/') => {
                    while self.current().is_some() && self.current() != Some('\n') {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_number(&mut self) -> Result<f64, CompileError> {
        let (line, col) = (self.line, self.col);
        let mut text = String::new();
        if self.current() == Some('-') {
            text.push('-');
            self.advance();
        }
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() || ch == '.' {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        text.parse()
            .map_err(|_| CompileError::at(line, col, format!("bad number '{text}'")))
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        word
    }

    fn read_string(&mut self) -> Result<String, CompileError> {
        let (line, col) = (self.line, self.col);
        self.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.current() {
                Some('"') => {
                    self.advance();
                    return Ok(text);
                }
                Some('\n') | None => {
                    return Err(CompileError::at(line, col, "unterminated string"));
                }
                Some(ch) => {
                    text.push(ch);
                    self.advance();
                }
            }
        }
    }

    fn tokenize(mut self) -> Result<Vec<Lexed>, CompileError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_blanks();
            let (line, col) = (self.line, self.col);
            let tok = match self.current() {
                None => Tok::Eof,
                Some('\n') => {
                    self.advance();
                    Tok::Newline
                }
                Some('~') => {
                    self.advance();
                    let name = self.read_word();
                    if name.is_empty() {
                        return Err(CompileError::at(line, col, "expected a name after ~"));
                    }
                    Tok::Ref(name)
                }
                Some('"') => Tok::Str(self.read_string()?),
                Some(':') => {
                    self.advance();
                    Tok::Colon
                }
                Some('>') if self.peek() == Some('>') => {
                    self.advance();
                    self.advance();
                    Tok::Chain
                }
                Some('+') => {
                    self.advance();
                    Tok::Plus
                }
                Some(',') => {
                    self.advance();
                    Tok::Comma
                }
                Some('-') if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                    Tok::Number(self.read_number()?)
                }
                Some(ch) if ch.is_ascii_digit() => Tok::Number(self.read_number()?),
                Some(ch) if ch.is_alphabetic() => Tok::Ident(self.read_word()),
                Some(ch) => {
                    return Err(CompileError::at(line, col, format!("unexpected '{ch}'")));
                }
            };
            let done = tok == Tok::Eof;
            tokens.push(Lexed { tok, line, col });
            if done {
                return Ok(tokens);
            }
        }
    }
}

struct Parser {
    tokens: Vec<Lexed>,
    position: usize,
    lines: Vec<String>,
}

impl Parser {
    fn current(&self) -> &Lexed {
        // The token stream always ends in Eof, so last() is safe here.
        self.tokens
            .get(self.position)
            .unwrap_or_else(|| self.tokens.last().unwrap())
    }

    fn advance(&mut self) {
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        let at = self.current();
        let mut err = CompileError::at(at.line, at.col, message);
        if at.line > 0 && at.line <= self.lines.len() {
            err = err.with_snippet(self.lines[at.line - 1].clone());
        }
        err
    }

    fn expect_colon(&mut self) -> Result<(), CompileError> {
        if self.current().tok == Tok::Colon {
            self.advance();
            Ok(())
        } else {
            Err(self.error("expected ':'"))
        }
    }

    fn expect_number(&mut self) -> Result<f64, CompileError> {
        if let Tok::Number(v) = self.current().tok {
            self.advance();
            Ok(v)
        } else {
            Err(self.error("expected a number"))
        }
    }

    fn expect_string(&mut self) -> Result<String, CompileError> {
        if let Tok::Str(s) = self.current().tok.clone() {
            self.advance();
            Ok(s)
        } else {
            Err(self.error("expected a quoted label"))
        }
    }

    fn expect_end_of_line(&mut self) -> Result<(), CompileError> {
        match self.current().tok {
            Tok::Newline => {
                self.advance();
                Ok(())
            }
            Tok::Eof => Ok(()),
            _ => Err(self.error("expected end of line")),
        }
    }

    fn parse_arg(&mut self) -> Result<Arg, CompileError> {
        match self.current().tok.clone() {
            Tok::Number(v) => {
                self.advance();
                Ok(Arg::Value(v))
            }
            Tok::Ref(name) => {
                self.advance();
                Ok(Arg::Ref(name))
            }
            _ => Err(self.error("expected a number or ~reference")),
        }
    }

    fn parse_source(&mut self) -> Result<Source, CompileError> {
        match self.current().tok.clone() {
            Tok::Number(v) => {
                self.advance();
                Ok(Source::Const(v))
            }
            Tok::Ref(name) => {
                self.advance();
                Ok(Source::Ref(name))
            }
            Tok::Ident(word) => {
                self.advance();
                let wave = match word.as_str() {
                    "sin" | "sine" => Some(Waveform::Sine),
                    "saw" => Some(Waveform::Saw),
                    "square" => Some(Waveform::Square),
                    "tri" | "triangle" => Some(Waveform::Triangle),
                    _ => None,
                };
                if let Some(wave) = wave {
                    return Ok(Source::Osc {
                        wave,
                        freq: self.parse_arg()?,
                    });
                }
                match word.as_str() {
                    "noise" => Ok(Source::Noise),
                    "in" => {
                        let channel = self.expect_number()?;
                        if channel < 0.0 || channel.fract() != 0.0 {
                            return Err(self.error("input channel must be a non-negative integer"));
                        }
                        Ok(Source::Input {
                            channel: channel as usize,
                        })
                    }
                    _ => Err(CompileError::at(
                        self.tokens[self.position.saturating_sub(1)].line,
                        self.tokens[self.position.saturating_sub(1)].col,
                        format!("unknown generator '{word}'"),
                    )
                    .with_hint("expected sin, saw, square, tri, noise, in, a number, or ~ref")),
                }
            }
            _ => Err(self.error("expected a signal source")),
        }
    }

    fn parse_stage(&mut self) -> Result<Stage, CompileError> {
        let word = match self.current().tok.clone() {
            Tok::Ident(word) => word,
            _ => return Err(self.error("expected a stage name after >>")),
        };
        self.advance();
        match word.as_str() {
            "mul" => Ok(Stage::Mul(self.parse_arg()?)),
            "add" => Ok(Stage::Add(self.parse_arg()?)),
            "lpf" => Ok(Stage::LowPass {
                cutoff: self.parse_arg()?,
                q: self.parse_arg()?,
            }),
            "hpf" => Ok(Stage::HighPass {
                cutoff: self.parse_arg()?,
                q: self.parse_arg()?,
            }),
            "delay" => Ok(Stage::Delay {
                time: self.parse_arg()?,
                feedback: self.parse_arg()?,
            }),
            "clip" => Ok(Stage::Clip {
                lo: self.parse_arg()?,
                hi: self.parse_arg()?,
            }),
            "meter" | "vmeter" => {
                let label = self.expect_string()?;
                let min = self.expect_number()?;
                let max = self.expect_number()?;
                Ok(Stage::Meter(ControlDef {
                    kind: if word == "meter" {
                        WidgetKind::HMeter
                    } else {
                        WidgetKind::VMeter
                    },
                    label,
                    init: min,
                    min,
                    max,
                }))
            }
            _ => Err(CompileError::at(
                self.tokens[self.position.saturating_sub(1)].line,
                self.tokens[self.position.saturating_sub(1)].col,
                format!("unknown stage '{word}'"),
            )
            .with_hint("expected mul, add, lpf, hpf, delay, clip, or meter")),
        }
    }

    fn parse_chain(&mut self) -> Result<Chain, CompileError> {
        let source = self.parse_source()?;
        let mut stages = Vec::new();
        while self.current().tok == Tok::Chain {
            self.advance();
            stages.push(self.parse_stage()?);
        }
        Ok(Chain { source, stages })
    }

    fn parse_expr(&mut self) -> Result<Expr, CompileError> {
        let mut expr = Expr::Chain(self.parse_chain()?);
        while self.current().tok == Tok::Plus {
            self.advance();
            let rhs = Expr::Chain(self.parse_chain()?);
            expr = Expr::Sum(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    /// `slider "Label" init min max`, `button "Label"`, etc.
    fn parse_widget(&mut self, kind: WidgetKind) -> Result<ControlDef, CompileError> {
        self.advance(); // the widget keyword
        let label = self.expect_string()?;
        match kind {
            WidgetKind::HSlider | WidgetKind::VSlider | WidgetKind::NumEntry => {
                let init = self.expect_number()?;
                let min = self.expect_number()?;
                let max = self.expect_number()?;
                Ok(ControlDef {
                    kind,
                    label,
                    init,
                    min,
                    max,
                })
            }
            WidgetKind::Button | WidgetKind::CheckBox => Ok(ControlDef {
                kind,
                label,
                init: 0.0,
                min: 0.0,
                max: 1.0,
            }),
            // Meters only appear inline in chains.
            WidgetKind::HMeter | WidgetKind::VMeter => unreachable!(),
        }
    }

    fn widget_kind(word: &str) -> Option<WidgetKind> {
        match word {
            "slider" | "hslider" => Some(WidgetKind::HSlider),
            "vslider" => Some(WidgetKind::VSlider),
            "nentry" => Some(WidgetKind::NumEntry),
            "button" => Some(WidgetKind::Button),
            "check" | "checkbox" => Some(WidgetKind::CheckBox),
            _ => None,
        }
    }

    fn parse_program(&mut self) -> Result<ProgramDef, CompileError> {
        let mut statements = Vec::new();

        loop {
            match self.current().tok.clone() {
                Tok::Eof => break,
                Tok::Newline => {
                    self.advance();
                }
                Tok::Ref(name) => {
                    let line = self.current().line;
                    self.advance();
                    self.expect_colon()?;
                    let widget = match &self.current().tok {
                        Tok::Ident(word) => Self::widget_kind(word),
                        _ => None,
                    };
                    let statement = match widget {
                        Some(kind) => Statement::Control {
                            name,
                            def: self.parse_widget(kind)?,
                            line,
                        },
                        None => Statement::Bus {
                            name,
                            expr: self.parse_expr()?,
                            line,
                        },
                    };
                    statements.push(statement);
                    self.expect_end_of_line()?;
                }
                Tok::Ident(word) if word == "out" => {
                    let line = self.current().line;
                    self.advance();
                    self.expect_colon()?;
                    let mut chains = vec![self.parse_expr()?];
                    while self.current().tok == Tok::Comma {
                        self.advance();
                        chains.push(self.parse_expr()?);
                    }
                    statements.push(Statement::Output { chains, line });
                    self.expect_end_of_line()?;
                }
                _ => {
                    return Err(self
                        .error("expected a statement")
                        .with_hint("statements are '~name: ...' or 'out: ...'"));
                }
            }
        }

        Ok(ProgramDef { statements })
    }
}

/// Parse source text into a raw program definition.
pub fn parse(input: &str) -> Result<ProgramDef, CompileError> {
    let tokens = Tokenizer::new(input).tokenize()?;
    let mut parser = Parser {
        tokens,
        position: 0,
        lines: input.lines().map(str::to_string).collect(),
    };
    parser.parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_chain() {
        let tokens = Tokenizer::new("~lfo: sin 2 >> mul 0.5").tokenize().unwrap();
        let toks: Vec<&Tok> = tokens.iter().map(|l| &l.tok).collect();
        assert_eq!(toks[0], &Tok::Ref("lfo".into()));
        assert_eq!(toks[1], &Tok::Colon);
        assert_eq!(toks[2], &Tok::Ident("sin".into()));
        assert_eq!(toks[3], &Tok::Number(2.0));
        assert_eq!(toks[4], &Tok::Chain);
        assert_eq!(toks[5], &Tok::Ident("mul".into()));
        assert_eq!(toks[6], &Tok::Number(0.5));
        assert_eq!(toks[7], &Tok::Eof);
    }

    #[test]
    fn test_tokenize_negative_number_and_comment() {
        let tokens = Tokenizer::new("// pan range\n~p: slider \"Pan\" 0 -1 1")
            .tokenize()
            .unwrap();
        assert!(tokens.iter().any(|l| l.tok == Tok::Number(-1.0)));
        // Comment collapses to the newline that follows it
        assert_eq!(tokens[0].tok, Tok::Newline);
    }

    #[test]
    fn test_parse_bus_and_output() {
        let def = parse("~lfo: sin 2 >> mul 0.5 >> add 0.5\nout: saw 110 >> mul ~lfo").unwrap();
        assert_eq!(def.statements.len(), 2);
        assert!(matches!(def.statements[0], Statement::Bus { .. }));
        assert!(matches!(def.statements[1], Statement::Output { .. }));
    }

    #[test]
    fn test_parse_control_declarations() {
        let def = parse(
            "~g: slider \"Gain\" 0.5 0.0 1.0\n~m: checkbox \"Mute\"\n~t: button \"Trig\"\nout: sin 440",
        )
        .unwrap();
        let kinds: Vec<WidgetKind> = def
            .statements
            .iter()
            .filter_map(|s| match s {
                Statement::Control { def, .. } => Some(def.kind),
                _ => None,
            })
            .collect();
        assert_eq!(
            kinds,
            vec![WidgetKind::HSlider, WidgetKind::CheckBox, WidgetKind::Button]
        );
    }

    #[test]
    fn test_parse_multichannel_output() {
        let def = parse("out: sin 440, sin 441").unwrap();
        match &def.statements[0] {
            Statement::Output { chains, .. } => assert_eq!(chains.len(), 2),
            other => panic!("expected output, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_sum_of_chains() {
        let def = parse("out: sin 440 >> mul 0.5 + saw 220 >> mul 0.3").unwrap();
        match &def.statements[0] {
            Statement::Output { chains, .. } => {
                assert!(matches!(chains[0], Expr::Sum(_, _)));
            }
            other => panic!("expected output, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_errors_carry_location() {
        let err = parse("out: sin 440 >> lfp 1000 0.7").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("lfp"));
        assert!(err.hint.is_some());

        let err = parse("out: sin").unwrap_err();
        assert!(err.message.contains("number or ~reference"));

        let err = parse("out sin 440").unwrap_err();
        assert!(err.message.contains("':'"));
    }

    #[test]
    fn test_parse_rejects_trailing_tokens() {
        let err = parse("out: sin 440 441").unwrap_err();
        assert!(err.message.contains("end of line"));
    }
}
