// Formula parser - converts formula strings into AST
// Supports: numbers, strings, booleans, cell refs (A1), ranges (A1:A5), functions (SUM),
// arithmetic (+ - * / % ^), unary minus/plus, concatenation (&), comparisons (= <> < > <= >=)

use crate::address::{Address, Range};
use crate::error::SyntaxError;

use super::value::{format_number, RawValue};

/// Formula AST. Immutable once built; owned by the formula cell it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Number, text or boolean constant
    Literal(RawValue),
    CellRef(Address),
    RangeRef(Range),
    BinaryOp {
        op: Op,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    FunctionCall {
        name: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,     // %
    Pow,     // ^
    // String
    Concat,  // &
    // Comparison
    Eq,      // =
    NotEq,   // <>
    Lt,      // <
    Gt,      // >
    LtEq,    // <=
    GtEq,    // >=
}

impl Op {
    pub fn symbol(&self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Mod => "%",
            Op::Pow => "^",
            Op::Concat => "&",
            Op::Eq => "=",
            Op::NotEq => "<>",
            Op::Lt => "<",
            Op::Gt => ">",
            Op::LtEq => "<=",
            Op::GtEq => ">=",
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Op::Eq | Op::NotEq | Op::Lt | Op::Gt | Op::LtEq | Op::GtEq => 1,
            Op::Concat => 2,
            Op::Add | Op::Sub => 3,
            Op::Mul | Op::Div | Op::Mod => 4,
            Op::Pow => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
}

const UNARY_PRECEDENCE: u8 = 5;

/// Parse a formula string (which must start with `=`) into an AST.
pub fn parse(formula: &str) -> Result<Expr, SyntaxError> {
    let lead = formula.len() - formula.trim_start().len();
    let body = &formula[lead..];
    let Some(input) = body.strip_prefix('=') else {
        return Err(SyntaxError::new("Formula must start with =", 0));
    };

    // Positions are character offsets into the original text.
    let offset = formula[..lead].chars().count() + 1;
    let tokens = tokenize(input, offset)?;
    if tokens.is_empty() {
        return Err(SyntaxError::new("Empty formula", offset));
    }

    let (expr, pos) = parse_comparison(&tokens, 0, 0)?;
    if pos < tokens.len() {
        return Err(SyntaxError::new(
            format!("Unexpected {}", tokens[pos].token.describe()),
            tokens[pos].position,
        ));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    StringLit(String),
    CellRef(Address),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Ampersand,
    LParen,
    RParen,
    Colon,
    Comma,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", format_number(*n)),
            Token::StringLit(s) => format!("string \"{}\"", s),
            Token::CellRef(a) => format!("reference {}", a),
            Token::Ident(s) => format!("identifier {}", s),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Percent => "'%'".to_string(),
            Token::Caret => "'^'".to_string(),
            Token::Ampersand => "'&'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Colon => "':'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Eq => "'='".to_string(),
            Token::NotEq => "'<>'".to_string(),
            Token::Lt => "'<'".to_string(),
            Token::Gt => "'>'".to_string(),
            Token::LtEq => "'<='".to_string(),
            Token::GtEq => "'>='".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    position: usize,
}

fn tokenize(input: &str, offset: usize) -> Result<Vec<Spanned>, SyntaxError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        let position = offset + start;

        let simple = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '%' => Some(Token::Percent),
            '^' => Some(Token::Caret),
            '&' => Some(Token::Ampersand),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ':' => Some(Token::Colon),
            ',' => Some(Token::Comma),
            '=' => Some(Token::Eq),
            _ => None,
        };
        if let Some(token) = simple {
            tokens.push(Spanned { token, position });
            i += 1;
            continue;
        }

        match c {
            ' ' | '\t' | '\n' | '\r' => {
                i += 1;
            }
            '<' => {
                let token = match chars.get(i + 1) {
                    Some('=') => { i += 1; Token::LtEq }
                    Some('>') => { i += 1; Token::NotEq }
                    _ => Token::Lt,
                };
                i += 1;
                tokens.push(Spanned { token, position });
            }
            '>' => {
                let token = if chars.get(i + 1) == Some(&'=') {
                    i += 1;
                    Token::GtEq
                } else {
                    Token::Gt
                };
                i += 1;
                tokens.push(Spanned { token, position });
            }
            '"' => {
                // String literal; "" inside is an escaped quote
                i += 1;
                let mut s = String::new();
                loop {
                    match chars.get(i) {
                        Some('"') if chars.get(i + 1) == Some(&'"') => {
                            s.push('"');
                            i += 2;
                        }
                        Some('"') => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            s.push(*ch);
                            i += 1;
                        }
                        None => return Err(SyntaxError::new("Unterminated string literal", position)),
                    }
                }
                tokens.push(Spanned { token: Token::StringLit(s), position });
            }
            '0'..='9' | '.' => {
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // Exponent: only consumed when digits follow
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        while j < chars.len() && chars[j].is_ascii_digit() {
                            j += 1;
                        }
                        i = j;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let num: f64 = text
                    .parse()
                    .map_err(|_| SyntaxError::new(format!("Invalid number: {}", text), position))?;
                tokens.push(Spanned { token: Token::Number(num), position });
            }
            'A'..='Z' | 'a'..='z' | '_' | '$' => {
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '$')
                {
                    i += 1;
                }
                // Dotted function names (e.g. STDEV.P)
                while i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_alphabetic() {
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                        i += 1;
                    }
                }
                let ident: String = chars[start..i].iter().collect();
                let followed_by_paren = chars.get(i) == Some(&'(');

                let token = if followed_by_paren {
                    Token::Ident(ident.to_uppercase())
                } else if let Some(addr) = Address::parse(&ident) {
                    Token::CellRef(addr)
                } else if ident.contains('$') {
                    return Err(SyntaxError::new(format!("Invalid cell reference: {}", ident), position));
                } else {
                    Token::Ident(ident.to_uppercase())
                };
                tokens.push(Spanned { token, position });
            }
            _ => return Err(SyntaxError::new(format!("Unexpected character: {}", c), position)),
        }
    }

    Ok(tokens)
}

fn end_position(tokens: &[Spanned]) -> usize {
    tokens.last().map(|t| t.position + 1).unwrap_or(0)
}

/// Deepest nesting of parentheses, calls and unary or power operators.
const MAX_DEPTH: usize = 256;

fn check_depth(tokens: &[Spanned], pos: usize, depth: usize) -> Result<(), SyntaxError> {
    if depth <= MAX_DEPTH {
        return Ok(());
    }
    let position = tokens.get(pos).map_or_else(|| end_position(tokens), |t| t.position);
    Err(SyntaxError::new("Formula nested too deeply", position))
}

fn binary(op: Op, left: Expr, right: Expr) -> Expr {
    Expr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

// Lowest precedence: comparison operators
fn parse_comparison(tokens: &[Spanned], pos: usize, depth: usize) -> Result<(Expr, usize), SyntaxError> {
    check_depth(tokens, pos, depth)?;
    let (mut left, mut pos) = parse_concat(tokens, pos, depth)?;

    while pos < tokens.len() {
        let op = match &tokens[pos].token {
            Token::Eq => Op::Eq,
            Token::NotEq => Op::NotEq,
            Token::Lt => Op::Lt,
            Token::Gt => Op::Gt,
            Token::LtEq => Op::LtEq,
            Token::GtEq => Op::GtEq,
            _ => break,
        };
        let (right, new_pos) = parse_concat(tokens, pos + 1, depth)?;
        left = binary(op, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

// String concatenation (&)
fn parse_concat(tokens: &[Spanned], pos: usize, depth: usize) -> Result<(Expr, usize), SyntaxError> {
    let (mut left, mut pos) = parse_add_sub(tokens, pos, depth)?;

    while pos < tokens.len() && tokens[pos].token == Token::Ampersand {
        let (right, new_pos) = parse_add_sub(tokens, pos + 1, depth)?;
        left = binary(Op::Concat, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_add_sub(tokens: &[Spanned], pos: usize, depth: usize) -> Result<(Expr, usize), SyntaxError> {
    let (mut left, mut pos) = parse_mul_div(tokens, pos, depth)?;

    while pos < tokens.len() {
        let op = match &tokens[pos].token {
            Token::Plus => Op::Add,
            Token::Minus => Op::Sub,
            _ => break,
        };
        let (right, new_pos) = parse_mul_div(tokens, pos + 1, depth)?;
        left = binary(op, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_mul_div(tokens: &[Spanned], pos: usize, depth: usize) -> Result<(Expr, usize), SyntaxError> {
    let (mut left, mut pos) = parse_unary(tokens, pos, depth)?;

    while pos < tokens.len() {
        let op = match &tokens[pos].token {
            Token::Star => Op::Mul,
            Token::Slash => Op::Div,
            Token::Percent => Op::Mod,
            _ => break,
        };
        let (right, new_pos) = parse_unary(tokens, pos + 1, depth)?;
        left = binary(op, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

// Unary minus/plus bind looser than ^ so that -2^2 = -4
fn parse_unary(tokens: &[Spanned], pos: usize, depth: usize) -> Result<(Expr, usize), SyntaxError> {
    let op = match tokens.get(pos).map(|t| &t.token) {
        Some(Token::Minus) => UnaryOp::Neg,
        Some(Token::Plus) => UnaryOp::Plus,
        _ => return parse_power(tokens, pos, depth),
    };
    check_depth(tokens, pos, depth + 1)?;
    let (operand, pos) = parse_unary(tokens, pos + 1, depth + 1)?;
    Ok((
        Expr::UnaryOp {
            op,
            operand: Box::new(operand),
        },
        pos,
    ))
}

// Exponentiation (^) - right-associative
fn parse_power(tokens: &[Spanned], pos: usize, depth: usize) -> Result<(Expr, usize), SyntaxError> {
    let (base, pos) = parse_primary(tokens, pos, depth)?;

    if pos < tokens.len() && tokens[pos].token == Token::Caret {
        check_depth(tokens, pos, depth + 1)?;
        let (exponent, new_pos) = parse_unary(tokens, pos + 1, depth + 1)?;
        return Ok((binary(Op::Pow, base, exponent), new_pos));
    }

    Ok((base, pos))
}

fn parse_primary(tokens: &[Spanned], pos: usize, depth: usize) -> Result<(Expr, usize), SyntaxError> {
    let Some(current) = tokens.get(pos) else {
        return Err(SyntaxError::new("Unexpected end of formula", end_position(tokens)));
    };

    match &current.token {
        Token::Number(n) => Ok((Expr::Literal(RawValue::Number(*n)), pos + 1)),
        Token::StringLit(s) => Ok((Expr::Literal(RawValue::Text(s.clone())), pos + 1)),
        Token::CellRef(start) => {
            // A1:B5
            if tokens.get(pos + 1).map(|t| &t.token) == Some(&Token::Colon) {
                return match tokens.get(pos + 2) {
                    Some(Spanned { token: Token::CellRef(end), .. }) => {
                        Ok((Expr::RangeRef(Range::new(*start, *end)), pos + 3))
                    }
                    Some(other) => Err(SyntaxError::new(
                        "Range must end with a cell reference",
                        other.position,
                    )),
                    None => Err(SyntaxError::new(
                        "Range must end with a cell reference",
                        end_position(tokens),
                    )),
                };
            }
            Ok((Expr::CellRef(*start), pos + 1))
        }
        Token::Ident(name) => {
            if name == "TRUE" {
                return Ok((Expr::Literal(RawValue::Boolean(true)), pos + 1));
            }
            if name == "FALSE" {
                return Ok((Expr::Literal(RawValue::Boolean(false)), pos + 1));
            }
            if tokens.get(pos + 1).map(|t| &t.token) == Some(&Token::LParen) {
                let (args, new_pos) = parse_function_args(tokens, pos + 2, depth + 1)?;
                return Ok((
                    Expr::FunctionCall {
                        name: name.clone(),
                        args,
                    },
                    new_pos,
                ));
            }
            Err(SyntaxError::new(format!("Unknown identifier: {}", name), current.position))
        }
        Token::LParen => {
            let (expr, pos) = parse_comparison(tokens, pos + 1, depth + 1)?;
            match tokens.get(pos) {
                Some(Spanned { token: Token::RParen, .. }) => Ok((expr, pos + 1)),
                Some(other) => Err(SyntaxError::new("Expected closing parenthesis", other.position)),
                None => Err(SyntaxError::new("Missing closing parenthesis", end_position(tokens))),
            }
        }
        other => Err(SyntaxError::new(
            format!("Unexpected {}", other.describe()),
            current.position,
        )),
    }
}

fn parse_function_args(tokens: &[Spanned], pos: usize, depth: usize) -> Result<(Vec<Expr>, usize), SyntaxError> {
    let mut args = Vec::new();
    let mut pos = pos;

    // SUM()
    if tokens.get(pos).map(|t| &t.token) == Some(&Token::RParen) {
        return Ok((args, pos + 1));
    }

    loop {
        let (arg, new_pos) = parse_comparison(tokens, pos, depth)?;
        args.push(arg);
        pos = new_pos;

        match tokens.get(pos) {
            Some(Spanned { token: Token::RParen, .. }) => return Ok((args, pos + 1)),
            Some(Spanned { token: Token::Comma, .. }) => pos += 1,
            Some(other) => {
                return Err(SyntaxError::new(
                    "Expected comma or closing parenthesis",
                    other.position,
                ))
            }
            None => {
                return Err(SyntaxError::new(
                    "Missing closing parenthesis in function call",
                    end_position(tokens),
                ))
            }
        }
    }
}

// =============================================================================
// Formula Printing - Convert Expr back to string
// =============================================================================

/// Format an expression as canonical formula text (with leading '=').
pub fn format_expr(expr: &Expr) -> String {
    format!("={}", format_expr_inner(expr))
}

/// Format an expression without the leading '='.
pub fn format_expr_inner(expr: &Expr) -> String {
    match expr {
        Expr::Literal(RawValue::Text(s)) => format!("\"{}\"", s.replace('"', "\"\"")),
        Expr::Literal(v) => v.display_text(),
        Expr::CellRef(addr) => addr.to_string(),
        Expr::RangeRef(range) => range.to_string(),
        Expr::FunctionCall { name, args } => {
            let args_str: Vec<String> = args.iter().map(format_expr_inner).collect();
            format!("{}({})", name, args_str.join(","))
        }
        Expr::UnaryOp { op, operand } => {
            let inner = format_operand(operand, UNARY_PRECEDENCE, false);
            match op {
                UnaryOp::Neg => format!("-{}", inner),
                UnaryOp::Plus => format!("+{}", inner),
            }
        }
        Expr::BinaryOp { op, left, right } => {
            let prec = op.precedence();
            // ^ is right-associative; everything else is left-associative
            let (left_strict, right_strict) = if *op == Op::Pow { (true, false) } else { (false, true) };
            format!(
                "{}{}{}",
                format_operand(left, prec, left_strict),
                op.symbol(),
                format_operand(right, prec, right_strict)
            )
        }
    }
}

fn format_operand(expr: &Expr, parent_prec: u8, strict: bool) -> String {
    let prec = match expr {
        Expr::BinaryOp { op, .. } => op.precedence(),
        Expr::UnaryOp { .. } => UNARY_PRECEDENCE,
        _ => u8::MAX,
    };
    let needs_parens = prec < parent_prec || (strict && prec == parent_prec);
    let text = format_expr_inner(expr);
    if needs_parens {
        format!("({})", text)
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Expr {
        Expr::Literal(RawValue::Number(n))
    }

    fn cell(s: &str) -> Expr {
        Expr::CellRef(Address::parse(s).unwrap())
    }

    #[test]
    fn test_parse_cell_plus_number() {
        let expr = parse("=A1+5").unwrap();
        assert_eq!(expr, binary(Op::Add, cell("A1"), num(5.0)));
    }

    #[test]
    fn test_precedence_mul_over_add() {
        let expr = parse("=1+2*3").unwrap();
        assert_eq!(expr, binary(Op::Add, num(1.0), binary(Op::Mul, num(2.0), num(3.0))));
    }

    #[test]
    fn test_comparison_lowest() {
        let expr = parse("=A1+1>=B1").unwrap();
        assert_eq!(
            expr,
            binary(Op::GtEq, binary(Op::Add, cell("A1"), num(1.0)), cell("B1"))
        );
    }

    #[test]
    fn test_modulo_is_multiplicative() {
        let expr = parse("=7%3+1").unwrap();
        assert_eq!(expr, binary(Op::Add, binary(Op::Mod, num(7.0), num(3.0)), num(1.0)));
    }

    #[test]
    fn test_left_associative_sub() {
        let expr = parse("=10-4-3").unwrap();
        assert_eq!(expr, binary(Op::Sub, binary(Op::Sub, num(10.0), num(4.0)), num(3.0)));
    }

    #[test]
    fn test_power_right_associative_and_unary() {
        let expr = parse("=2^3^2").unwrap();
        assert_eq!(expr, binary(Op::Pow, num(2.0), binary(Op::Pow, num(3.0), num(2.0))));

        let neg = parse("=-2^2").unwrap();
        assert_eq!(
            neg,
            Expr::UnaryOp {
                op: UnaryOp::Neg,
                operand: Box::new(binary(Op::Pow, num(2.0), num(2.0))),
            }
        );
    }

    #[test]
    fn test_unary_minus_on_cell() {
        let expr = parse("=--A1").unwrap();
        assert_eq!(
            expr,
            Expr::UnaryOp {
                op: UnaryOp::Neg,
                operand: Box::new(Expr::UnaryOp {
                    op: UnaryOp::Neg,
                    operand: Box::new(cell("A1")),
                }),
            }
        );
    }

    #[test]
    fn test_range_normalized() {
        let expr = parse("=SUM(B3:A1)").unwrap();
        let Expr::FunctionCall { name, args } = expr else {
            panic!("expected function call");
        };
        assert_eq!(name, "SUM");
        assert_eq!(
            args,
            vec![Expr::RangeRef(Range::new(Address::new(0, 0), Address::new(1, 2)))]
        );
    }

    #[test]
    fn test_function_names_case_insensitive() {
        let expr = parse("=sum(a1, 2)").unwrap();
        assert_eq!(
            expr,
            Expr::FunctionCall {
                name: "SUM".to_string(),
                args: vec![cell("A1"), num(2.0)],
            }
        );
    }

    #[test]
    fn test_function_name_that_looks_like_cell() {
        let expr = parse("=LOG10(A1)").unwrap();
        assert!(matches!(expr, Expr::FunctionCall { ref name, .. } if name == "LOG10"));
    }

    #[test]
    fn test_dotted_function_name() {
        let expr = parse("=STDEV.P(A1:A3)").unwrap();
        assert!(matches!(expr, Expr::FunctionCall { ref name, .. } if name == "STDEV.P"));
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse("=TRUE").unwrap(), Expr::Literal(RawValue::Boolean(true)));
        assert_eq!(parse("=\"a\"\"b\"").unwrap(), Expr::Literal(RawValue::Text("a\"b".into())));
        assert_eq!(parse("=1.5e3").unwrap(), num(1500.0));
        assert_eq!(parse("=.5").unwrap(), num(0.5));
    }

    #[test]
    fn test_absolute_markers_ignored() {
        assert_eq!(parse("=$B$2").unwrap(), cell("B2"));
    }

    #[test]
    fn test_error_must_start_with_equals() {
        let err = parse("A1+1").unwrap_err();
        assert_eq!(err.position, 0);
    }

    #[test]
    fn test_error_positions() {
        // position counts from the start of the text, '=' included
        assert_eq!(parse("=1+").unwrap_err().position, 3);
        assert_eq!(parse("=1 # 2").unwrap_err().position, 3);
        assert_eq!(parse("=(1+2").unwrap_err().position, 5);
        assert_eq!(parse("=1 2").unwrap_err().position, 3);
        assert_eq!(parse("=FOO").unwrap_err().position, 1);
        assert_eq!(parse("=\"abc").unwrap_err().position, 1);
        assert_eq!(parse("  =)").unwrap_err().position, 3);
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("={}1{}", "(".repeat(20_000), ")".repeat(20_000));
        let err = parse(&deep).unwrap_err();
        assert_eq!(err.message, "Formula nested too deeply");

        let calls = format!("={}1{}", "ABS(".repeat(5_000), ")".repeat(5_000));
        assert_eq!(parse(&calls).unwrap_err().message, "Formula nested too deeply");

        let negs = format!("={}1", "-".repeat(20_000));
        assert_eq!(parse(&negs).unwrap_err().message, "Formula nested too deeply");

        let powers = format!("=2{}", "^2".repeat(20_000));
        assert_eq!(parse(&powers).unwrap_err().message, "Formula nested too deeply");

        let ok = format!("={}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(parse(&ok).unwrap(), num(1.0));
    }

    #[test]
    fn test_error_empty_formula() {
        assert!(parse("=").is_err());
        assert!(parse("=   ").is_err());
    }

    #[test]
    fn test_error_bad_range_and_args() {
        assert!(parse("=A1:").is_err());
        assert!(parse("=A1:5").is_err());
        assert!(parse("=SUM(1,,2)").is_err());
        assert!(parse("=SUM(1 2)").is_err());
        assert!(parse("=A0").is_err());
    }

    #[test]
    fn test_format_roundtrip_canonical() {
        for src in [
            "=A1+5",
            "=SUM(A1:A3)*2",
            "=(1+2)*3",
            "=10-(4-3)",
            "=2^3^2",
            "=(2^3)^2",
            "=-A1^2",
            "=IF(A1>=1,\"yes\",\"no\")",
            "=A1&\" \"&B1",
        ] {
            let expr = parse(src).unwrap();
            assert_eq!(format_expr(&expr), src);
            assert_eq!(parse(&format_expr(&expr)).unwrap(), expr);
        }
    }

    #[test]
    fn test_format_normalizes_spacing_and_case() {
        let expr = parse("= sum( a1 , $b$2 )").unwrap();
        assert_eq!(format_expr(&expr), "=SUM(A1,B2)");
    }
}
