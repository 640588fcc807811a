//! Syntactic rename pieces and the per-piece edit rules (§4.7).

use tower_lsp::lsp_types::{Range, TextEdit};

use super::compound_name::{CompoundDeclName, ParameterLabel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenamePieceKind {
    BaseName,
    KeywordBase,
    ParameterName,
    NoncollapsibleParameter,
    DeclArgLabel,
    CallArgLabel,
    CallArgColon,
    CallArgCombined,
    SelectorArgLabel,
}

/// Category a backend's syntactic rename resolver assigns a piece.
/// Only `ActiveCode` and `Selector` ever yield edits (§4.7 step 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceCategory {
    ActiveCode,
    Inactive,
    Mismatch,
    Unmatched,
    StringLiteral,
    Comment,
    Selector,
}

impl PieceCategory {
    fn yields_edits(self) -> bool {
        matches!(self, PieceCategory::ActiveCode | PieceCategory::Selector)
    }
}

#[derive(Debug, Clone)]
pub struct SyntacticRenamePiece {
    pub range: Range,
    pub kind: RenamePieceKind,
    pub category: PieceCategory,
    pub parameter_index: Option<usize>,
}

/// All pieces the backend's syntactic rename resolver found for one
/// rename location.
#[derive(Debug, Clone)]
pub struct SyntacticRenameName {
    pub pieces: Vec<SyntacticRenamePiece>,
}

/// Applies the edit rules in §4.7 to one piece, given the parsed old
/// and new compound names. Returns `None` when the rule produces no
/// edit.
pub fn edit_for_piece(piece: &SyntacticRenamePiece, old: &CompoundDeclName, new: &CompoundDeclName) -> Option<TextEdit> {
    if !piece.category.yields_edits() {
        return None;
    }

    let param_index = piece.parameter_index;
    let old_param = param_index.and_then(|i| old.parameter(i));
    let new_param = param_index.and_then(|i| new.parameter(i));
    let range_is_empty = piece.range.start == piece.range.end;

    match piece.kind {
        RenamePieceKind::BaseName => Some(TextEdit { range: piece.range, new_text: new.base_name.clone() }),

        RenamePieceKind::KeywordBase | RenamePieceKind::NoncollapsibleParameter => None,

        RenamePieceKind::ParameterName => {
            let (Some(old_param), Some(new_param)) = (old_param, new_param) else {
                return None;
            };
            if new_param.is_wildcard() && range_is_empty {
                if let ParameterLabel::Named(old_label) = old_param {
                    return Some(TextEdit { range: piece.range, new_text: format!(" {old_label}") });
                }
                None
            } else if let (ParameterLabel::Named(new_label), ParameterLabel::Named(old_internal)) =
                (new_param, old_param)
            {
                if new_label == old_internal && !range_is_empty {
                    Some(TextEdit { range: piece.range, new_text: String::new() })
                } else {
                    None
                }
            } else {
                None
            }
        }

        RenamePieceKind::DeclArgLabel => {
            let new_param = new_param?;
            let label = new_param.as_label_or_underscore();
            if range_is_empty {
                Some(TextEdit { range: piece.range, new_text: format!("{label} ") })
            } else {
                Some(TextEdit { range: piece.range, new_text: label.to_string() })
            }
        }

        RenamePieceKind::CallArgLabel => {
            let new_param = new_param?;
            let text = match new_param {
                ParameterLabel::Named(label) => label.clone(),
                ParameterLabel::Wildcard => String::new(),
            };
            Some(TextEdit { range: piece.range, new_text: text })
        }

        RenamePieceKind::CallArgColon => {
            let new_param = new_param?;
            if new_param.is_wildcard() {
                Some(TextEdit { range: piece.range, new_text: String::new() })
            } else {
                None
            }
        }

        RenamePieceKind::CallArgCombined => {
            let new_param = new_param?;
            match new_param {
                ParameterLabel::Named(name) => {
                    Some(TextEdit { range: piece.range, new_text: format!("{name}: ") })
                }
                ParameterLabel::Wildcard => None,
            }
        }

        RenamePieceKind::SelectorArgLabel => {
            let new_param = new_param?;
            Some(TextEdit { range: piece.range, new_text: new_param.as_label_or_underscore().to_string() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::Position;

    fn range(line: u32, sc: u32, ec: u32) -> Range {
        Range::new(Position::new(line, sc), Position::new(line, ec))
    }

    fn piece(kind: RenamePieceKind, r: Range, idx: Option<usize>) -> SyntacticRenamePiece {
        SyntacticRenamePiece { range: r, kind, category: PieceCategory::ActiveCode, parameter_index: idx }
    }

    #[test]
    fn base_name_replaced_with_new_base_name() {
        let old = CompoundDeclName::parse("foo");
        let new = CompoundDeclName::parse("bar");
        let p = piece(RenamePieceKind::BaseName, range(0, 0, 3), None);
        let edit = edit_for_piece(&p, &old, &new).unwrap();
        assert_eq!(edit.new_text, "bar");
    }

    #[test]
    fn inactive_category_never_yields_an_edit() {
        let old = CompoundDeclName::parse("foo");
        let new = CompoundDeclName::parse("bar");
        let mut p = piece(RenamePieceKind::BaseName, range(0, 0, 3), None);
        p.category = PieceCategory::Inactive;
        assert!(edit_for_piece(&p, &old, &new).is_none());
    }

    #[test]
    fn call_arg_colon_deleted_only_when_new_param_is_wildcard() {
        let old = CompoundDeclName::parse("foo(bar:)");
        let new = CompoundDeclName::parse("foo(_:)");
        let p = piece(RenamePieceKind::CallArgColon, range(0, 5, 6), Some(0));
        let edit = edit_for_piece(&p, &old, &new).unwrap();
        assert_eq!(edit.new_text, "");

        let new_named = CompoundDeclName::parse("foo(baz:)");
        assert!(edit_for_piece(&p, &old, &new_named).is_none());
    }

    #[test]
    fn decl_arg_label_insertion_on_empty_range() {
        let old = CompoundDeclName::parse("subscript(x:)");
        let new = CompoundDeclName::parse("subscript(x x:)");
        let p = piece(RenamePieceKind::DeclArgLabel, range(0, 10, 10), Some(0));
        let edit = edit_for_piece(&p, &old, &new).unwrap();
        assert_eq!(edit.new_text, "x ");
    }
}
