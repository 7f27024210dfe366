//! Expression parser
//!
//! Parses a tokenized expression into an [`Expr`] tree:
//! 1. parenthesized groups are folded recursively into sub-trees,
//! 2. unary sign sequences are fixed up (`a + - b` reads as `a + (-b)`,
//!    `!` counts modulo 2),
//! 3. the binary tree is built by first-match-in-priority-list operator
//!    selection over `& | + - * /`: the earliest operator in that order
//!    found scanning left-to-right is the split point. The list order
//!    determines binding; this is deliberately not mathematical
//!    precedence.

use crate::ast::{Expr, Hook, Op, RefExpr, RefKind};
use crate::error::SyntaxError;
use crate::token::tokenize;

/// Operator priority list. Earlier entries split first, i.e. bind last.
const OPERATOR_PRIORITY: [Op; 6] = [Op::And, Op::Or, Op::Add, Op::Sub, Op::Mul, Op::Div];

/// Parse an expression string into an expression tree.
pub fn parse(expr: &str) -> Result<Expr, SyntaxError> {
    let tokens = tokenize(expr);
    if tokens.is_empty() {
        return Err(SyntaxError::Empty);
    }
    let items = group(&tokens, expr)?;
    build(items, expr)
}

/// Raw parse items before unary fixup.
enum Item {
    Operand(Expr),
    Op(Op),
    Not,
}

/// Items after unary fixup: a strict `Operand (Op Operand)*` alternation.
#[derive(Clone)]
enum BinItem {
    Operand(Expr),
    Op(Op),
}

/// Fold parenthesized groups into operand sub-trees.
fn group(tokens: &[String], source: &str) -> Result<Vec<Item>, SyntaxError> {
    let mut items = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        match token {
            "(" => {
                let mut depth = 1usize;
                let mut j = i + 1;
                while j < tokens.len() {
                    match tokens[j].as_str() {
                        "(" => depth += 1,
                        ")" => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    j += 1;
                }
                if depth != 0 {
                    return Err(SyntaxError::UnbalancedParens(source.to_string()));
                }
                let inner = &tokens[i + 1..j];
                if inner.is_empty() {
                    return Err(SyntaxError::OperandMismatch(source.to_string()));
                }
                let sub_items = group(inner, source)?;
                items.push(Item::Operand(build(sub_items, source)?));
                i = j + 1;
            }
            ")" => return Err(SyntaxError::UnbalancedParens(source.to_string())),
            "!" => {
                items.push(Item::Not);
                i += 1;
            }
            _ => {
                let op = if token.len() == 1 {
                    token.chars().next().and_then(Op::from_symbol)
                } else {
                    None
                };
                match op {
                    Some(op) => items.push(Item::Op(op)),
                    None => items.push(Item::Operand(parse_operand(token, source)?)),
                }
                i += 1;
            }
        }
    }
    Ok(items)
}

/// Fix up unary signs, then split by operator priority.
fn build(items: Vec<Item>, source: &str) -> Result<Expr, SyntaxError> {
    let mut fixed: Vec<BinItem> = Vec::with_capacity(items.len());
    let mut pending_not = 0usize;
    let mut pending_neg = false;
    let mut expect_operand = true;

    for item in items {
        match item {
            Item::Not => {
                if !expect_operand {
                    return Err(SyntaxError::OperandMismatch(source.to_string()));
                }
                pending_not += 1;
            }
            Item::Op(op) => {
                if expect_operand {
                    // Operand position: only sign operators may be unary.
                    match op {
                        Op::Add => {}
                        Op::Sub => pending_neg = !pending_neg,
                        other => {
                            return Err(SyntaxError::MissingOperand {
                                operator: other.symbol(),
                                expr: source.to_string(),
                            })
                        }
                    }
                } else {
                    fixed.push(BinItem::Op(op));
                    expect_operand = true;
                }
            }
            Item::Operand(mut expr) => {
                if !expect_operand {
                    return Err(SyntaxError::OperandMismatch(source.to_string()));
                }
                if pending_neg {
                    expr = match expr {
                        Expr::Number(n) => Expr::Number(-n),
                        other => Expr::Binary {
                            lhs: Box::new(Expr::Number(0)),
                            op: Op::Sub,
                            rhs: Box::new(other),
                        },
                    };
                    pending_neg = false;
                }
                if pending_not % 2 == 1 {
                    expr = Expr::Not(Box::new(expr));
                }
                pending_not = 0;
                fixed.push(BinItem::Operand(expr));
                expect_operand = false;
            }
        }
    }
    if expect_operand {
        // Trailing operator, dangling sign or nothing at all.
        return Err(SyntaxError::OperandMismatch(source.to_string()));
    }

    split(&fixed, source)
}

/// Split at the earliest operator in the priority list.
fn split(items: &[BinItem], source: &str) -> Result<Expr, SyntaxError> {
    if items.len() == 1 {
        return match &items[0] {
            BinItem::Operand(expr) => Ok(expr.clone()),
            BinItem::Op(_) => Err(SyntaxError::OperandMismatch(source.to_string())),
        };
    }

    for priority_op in OPERATOR_PRIORITY {
        let position = items
            .iter()
            .position(|item| matches!(item, BinItem::Op(op) if *op == priority_op));
        if let Some(i) = position {
            let lhs = split(&items[..i], source)?;
            let rhs = split(&items[i + 1..], source)?;
            return Ok(Expr::Binary {
                lhs: Box::new(lhs),
                op: priority_op,
                rhs: Box::new(rhs),
            });
        }
    }
    Err(SyntaxError::OperandMismatch(source.to_string()))
}

/// Parse a single operand token.
fn parse_operand(token: &str, source: &str) -> Result<Expr, SyntaxError> {
    match token {
        "true" => return Ok(Expr::Number(1)),
        "false" => return Ok(Expr::Number(0)),
        _ => {}
    }

    let kind = match token.chars().next() {
        Some('#') => Some(RefKind::Object),
        Some('.') => Some(RefKind::Class),
        Some('$') => Some(RefKind::Layer),
        _ => None,
    };
    if let Some(kind) = kind {
        return parse_reference(kind, token);
    }

    token
        .parse::<i64>()
        .map(Expr::Number)
        .map_err(|_| SyntaxError::InvalidToken {
            token: token.to_string(),
            expr: source.to_string(),
        })
}

fn parse_reference(kind: RefKind, token: &str) -> Result<Expr, SyntaxError> {
    let rest = &token[1..];
    if rest.is_empty() {
        return Err(SyntaxError::EmptyReference {
            token: token.to_string(),
        });
    }

    let (name, hook) = match rest.split_once('.') {
        None => (rest, None),
        Some((name, hook_str)) => {
            if name.is_empty() {
                return Err(SyntaxError::EmptyReference {
                    token: token.to_string(),
                });
            }
            let hook = match hook_str {
                "start" => Hook::Start,
                "end" => Hook::End,
                "duration" => Hook::Duration,
                other => {
                    return Err(SyntaxError::UnknownHook {
                        hook: other.to_string(),
                        token: token.to_string(),
                    })
                }
            };
            (name, Some(hook))
        }
    };

    Ok(Expr::Ref(RefExpr {
        kind,
        name: name.to_string(),
        hook,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: i64) -> Expr {
        Expr::Number(n)
    }

    fn obj_ref(name: &str, hook: Option<Hook>) -> Expr {
        Expr::Ref(RefExpr {
            kind: RefKind::Object,
            name: name.to_string(),
            hook,
        })
    }

    #[test]
    fn test_single_number() {
        assert_eq!(parse("42").unwrap(), num(42));
        assert_eq!(parse("-42").unwrap(), num(-42));
        assert_eq!(parse("true").unwrap(), num(1));
        assert_eq!(parse("false").unwrap(), num(0));
    }

    #[test]
    fn test_simple_binary() {
        assert_eq!(
            parse("#video.start + 10").unwrap(),
            Expr::Binary {
                lhs: Box::new(obj_ref("video", Some(Hook::Start))),
                op: Op::Add,
                rhs: Box::new(num(10)),
            }
        );
    }

    #[test]
    fn test_priority_list_binding_is_not_mathematical() {
        // '+' splits before '*': 2 * 3 + 4 = (2 * 3) + 4
        let tree = parse("2 * 3 + 4").unwrap();
        assert_eq!(
            tree,
            Expr::Binary {
                lhs: Box::new(Expr::Binary {
                    lhs: Box::new(num(2)),
                    op: Op::Mul,
                    rhs: Box::new(num(3)),
                }),
                op: Op::Add,
                rhs: Box::new(num(4)),
            }
        );

        // Same-operator chains split at the FIRST occurrence, so the
        // right side nests: 8 / 4 / 2 = 8 / (4 / 2)
        let tree = parse("8 / 4 / 2").unwrap();
        assert_eq!(
            tree,
            Expr::Binary {
                lhs: Box::new(num(8)),
                op: Op::Div,
                rhs: Box::new(Expr::Binary {
                    lhs: Box::new(num(4)),
                    op: Op::Div,
                    rhs: Box::new(num(2)),
                }),
            }
        );
    }

    #[test]
    fn test_parens_override_splitting() {
        let tree = parse("(1 + 2) * 3").unwrap();
        assert_eq!(
            tree,
            Expr::Binary {
                lhs: Box::new(Expr::Binary {
                    lhs: Box::new(num(1)),
                    op: Op::Add,
                    rhs: Box::new(num(2)),
                }),
                op: Op::Mul,
                rhs: Box::new(num(3)),
            }
        );
    }

    #[test]
    fn test_unary_sign_fixup() {
        // a + - b reads as a + (-b)
        assert_eq!(
            parse("10 + - 4").unwrap(),
            Expr::Binary {
                lhs: Box::new(num(10)),
                op: Op::Add,
                rhs: Box::new(num(-4)),
            }
        );
        // unary minus on a reference becomes 0 - ref
        assert_eq!(
            parse("- #a").unwrap(),
            Expr::Binary {
                lhs: Box::new(num(0)),
                op: Op::Sub,
                rhs: Box::new(obj_ref("a", None)),
            }
        );
    }

    #[test]
    fn test_not_counts_modulo_two() {
        assert_eq!(parse("!#a").unwrap(), Expr::Not(Box::new(obj_ref("a", None))));
        assert_eq!(parse("!!#a").unwrap(), obj_ref("a", None));
        assert_eq!(parse("!!!#a").unwrap(), Expr::Not(Box::new(obj_ref("a", None))));
    }

    #[test]
    fn test_logical_expression() {
        assert_eq!(
            parse(".class0 & !$layer1").unwrap(),
            Expr::Binary {
                lhs: Box::new(Expr::Ref(RefExpr {
                    kind: RefKind::Class,
                    name: "class0".to_string(),
                    hook: None,
                })),
                op: Op::And,
                rhs: Box::new(Expr::Not(Box::new(Expr::Ref(RefExpr {
                    kind: RefKind::Layer,
                    name: "layer1".to_string(),
                    hook: None,
                })))),
            }
        );
    }

    #[test]
    fn test_reference_hooks() {
        assert_eq!(parse("#a.end").unwrap(), obj_ref("a", Some(Hook::End)));
        assert_eq!(
            parse("#a.duration").unwrap(),
            obj_ref("a", Some(Hook::Duration))
        );
        assert!(matches!(
            parse("#a.middle"),
            Err(SyntaxError::UnknownHook { .. })
        ));
        assert!(matches!(
            parse("#"),
            Err(SyntaxError::EmptyReference { .. })
        ));
    }

    #[test]
    fn test_malformed_expressions() {
        assert!(matches!(parse(""), Err(SyntaxError::Empty)));
        assert!(matches!(
            parse("(1 + 2"),
            Err(SyntaxError::UnbalancedParens(_))
        ));
        assert!(matches!(
            parse("1 + 2)"),
            Err(SyntaxError::UnbalancedParens(_))
        ));
        assert!(matches!(
            parse("1 +"),
            Err(SyntaxError::OperandMismatch(_))
        ));
        assert!(matches!(
            parse("1 2"),
            Err(SyntaxError::OperandMismatch(_))
        ));
        assert!(matches!(
            parse("1 & & 2"),
            Err(SyntaxError::MissingOperand { operator: '&', .. })
        ));
        assert!(matches!(
            parse("hello"),
            Err(SyntaxError::InvalidToken { .. })
        ));
    }

    #[test]
    fn test_constantness() {
        assert!(parse("10 + 5 * 2").unwrap().is_constant());
        assert!(!parse("#a.start + 10").unwrap().is_constant());
        assert!(!parse("!($l0 | .c0)").unwrap().is_constant());
    }
}
