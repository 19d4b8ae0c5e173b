use crate::utils::geometry::wrap_frac3;
use nalgebra::{Matrix3, Vector3};
use std::fmt;

// --- 1. ERROR HANDLING ---

/// Failure modes of symmetry operator parsing.
///
/// All variants mean the operator string is malformed; `equation` is the
/// zero-based index of the comma-separated equation that failed.
#[derive(Debug, Clone, PartialEq)]
pub enum SymmetryError {
    /// The string did not split into exactly three equations
    WrongEquationCount(usize),
    /// A character outside the operator alphabet (signs, digits, x/y/z, '/', '*')
    UnexpectedChar { equation: usize, ch: char },
    /// A numeric literal that does not parse as a number (e.g. "1.2.3")
    BadNumber { equation: usize, literal: String },
    /// A '/' with no numeric literal on one of its sides
    DanglingSlash { equation: usize },
    /// A fraction whose denominator literal is zero
    ZeroDenominator { equation: usize },
    /// An equation containing no terms at all
    EmptyEquation { equation: usize },
    /// A trailing sign or '*' with no term to apply it to
    DanglingOperator { equation: usize },
}

impl fmt::Display for SymmetryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SymmetryError::WrongEquationCount(n) => {
                write!(f, "Operator must have exactly 3 equations, got {}", n)
            }
            SymmetryError::UnexpectedChar { equation, ch } => {
                write!(f, "Unexpected character '{}' in equation {}", ch, equation + 1)
            }
            SymmetryError::BadNumber { equation, literal } => {
                write!(f, "Invalid numeric literal '{}' in equation {}", literal, equation + 1)
            }
            SymmetryError::DanglingSlash { equation } => {
                write!(f, "'/' without numerator or denominator in equation {}", equation + 1)
            }
            SymmetryError::ZeroDenominator { equation } => {
                write!(f, "Division by zero literal in equation {}", equation + 1)
            }
            SymmetryError::EmptyEquation { equation } => {
                write!(f, "Equation {} is empty", equation + 1)
            }
            SymmetryError::DanglingOperator { equation } => {
                write!(f, "Trailing operator with no term in equation {}", equation + 1)
            }
        }
    }
}

impl std::error::Error for SymmetryError {}

// --- 2. OPERATOR ---

/// A parsed symmetry operator: an affine map on fractional coordinates.
///
/// Built once from a textual expression like `"x,y,z"` or `"-x,1/2+y,-z"`
/// and reused across all sites. Application reduces each output component
/// modulo 1 into [0, 1).
#[derive(Debug, Clone, PartialEq)]
pub struct SymOp {
    rotation: Matrix3<f64>,
    translation: Vector3<f64>,
    source: String,
}

impl SymOp {
    /// Parse a textual operator of the form `±[coefficient*]axis[±shift]`
    /// per comma-separated equation (e.g. `"-x,1/2+y,-z"`).
    ///
    /// Equations reduce left to right into affine coefficients; the first
    /// equation produces the output x component, the second y, the third z.
    /// Malformed input fails with no partial result.
    pub fn parse(expr: &str) -> Result<SymOp, SymmetryError> {
        let equations: Vec<&str> = expr.split(',').collect();
        if equations.len() != 3 {
            return Err(SymmetryError::WrongEquationCount(equations.len()));
        }

        let mut rows = [[0.0f64; 4]; 3];
        for (i, eq) in equations.iter().enumerate() {
            let tokens = tokenize(eq, i)?;
            rows[i] = reduce(&tokens, i)?;
        }

        let rotation = Matrix3::new(
            rows[0][0], rows[0][1], rows[0][2],
            rows[1][0], rows[1][1], rows[1][2],
            rows[2][0], rows[2][1], rows[2][2],
        );
        let translation = Vector3::new(rows[0][3], rows[1][3], rows[2][3]);

        Ok(SymOp {
            rotation,
            translation,
            source: expr.trim().to_string(),
        })
    }

    /// The identity operator `"x,y,z"`.
    pub fn identity() -> SymOp {
        SymOp {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
            source: "x,y,z".to_string(),
        }
    }

    /// Apply the operator to a fractional coordinate and wrap the result
    /// into [0, 1) on every axis. Pure; returns an owned value.
    pub fn apply(&self, pos: [f64; 3]) -> [f64; 3] {
        let v = self.rotation * Vector3::from(pos) + self.translation;
        wrap_frac3([v.x, v.y, v.z])
    }

    /// The textual form this operator was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for SymOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// One-shot convenience: parse `op` and apply it to `pos`.
///
/// Prefer `SymOp::parse` + `SymOp::apply` when the same operator is applied
/// to many sites.
pub fn apply_symmetry(pos: [f64; 3], op: &str) -> Result<[f64; 3], SymmetryError> {
    Ok(SymOp::parse(op)?.apply(pos))
}

// --- 3. TOKENIZER / REDUCER ---

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Plus,
    Minus,
    Slash,
    Star,
    Axis(usize),
    Number(f64),
}

fn tokenize(eq: &str, equation: usize) -> Result<Vec<Token>, SymmetryError> {
    let mut tokens = Vec::new();
    let mut chars = eq.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' => {
                tokens.push(Token::Plus);
                chars.next();
            }
            '-' => {
                tokens.push(Token::Minus);
                chars.next();
            }
            '/' => {
                tokens.push(Token::Slash);
                chars.next();
            }
            '*' => {
                tokens.push(Token::Star);
                chars.next();
            }
            'x' | 'X' => {
                tokens.push(Token::Axis(0));
                chars.next();
            }
            'y' | 'Y' => {
                tokens.push(Token::Axis(1));
                chars.next();
            }
            'z' | 'Z' => {
                tokens.push(Token::Axis(2));
                chars.next();
            }
            '0'..='9' | '.' => {
                // Scan the whole literal span so multi-digit and decimal
                // constants are a single token (no single-char lookback).
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = literal.parse::<f64>().map_err(|_| SymmetryError::BadNumber {
                    equation,
                    literal: literal.clone(),
                })?;
                tokens.push(Token::Number(value));
            }
            _ => return Err(SymmetryError::UnexpectedChar { equation, ch: c }),
        }
    }

    Ok(tokens)
}

/// Reduce one equation's tokens to affine coefficients [cx, cy, cz, shift].
///
/// The sign is sticky: an axis letter or constant consumes the current sign
/// without resetting it, so `-x` followed by a bare `y` stays negated until
/// an explicit `+` appears.
fn reduce(tokens: &[Token], equation: usize) -> Result<[f64; 4], SymmetryError> {
    let mut coeffs = [0.0f64; 4];
    let mut sign = 1.0;
    let mut pending_sign = false;
    let mut terms = 0usize;
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i] {
            Token::Plus => {
                sign = 1.0;
                pending_sign = true;
                i += 1;
            }
            Token::Minus => {
                sign = -1.0;
                pending_sign = true;
                i += 1;
            }
            Token::Axis(axis) => {
                coeffs[axis] += sign;
                pending_sign = false;
                terms += 1;
                i += 1;
            }
            Token::Number(n) => {
                let mut value = n;
                i += 1;

                // Fractional constant: numerator '/' denominator
                if matches!(tokens.get(i), Some(Token::Slash)) {
                    i += 1;
                    match tokens.get(i) {
                        Some(Token::Number(d)) => {
                            if *d == 0.0 {
                                return Err(SymmetryError::ZeroDenominator { equation });
                            }
                            value /= d;
                            i += 1;
                        }
                        _ => return Err(SymmetryError::DanglingSlash { equation }),
                    }
                }

                // Coefficient applied to an axis: number '*' axis
                if matches!(tokens.get(i), Some(Token::Star)) {
                    i += 1;
                    match tokens.get(i) {
                        Some(Token::Axis(axis)) => {
                            coeffs[*axis] += sign * value;
                            i += 1;
                        }
                        _ => return Err(SymmetryError::DanglingOperator { equation }),
                    }
                } else {
                    coeffs[3] += sign * value;
                }
                pending_sign = false;
                terms += 1;
            }
            Token::Slash => {
                // '/' with no numeric literal before it
                return Err(SymmetryError::DanglingSlash { equation });
            }
            Token::Star => {
                return Err(SymmetryError::DanglingOperator { equation });
            }
        }
    }

    if terms == 0 {
        return Err(SymmetryError::EmptyEquation { equation });
    }
    if pending_sign {
        return Err(SymmetryError::DanglingOperator { equation });
    }

    Ok(coeffs)
}
