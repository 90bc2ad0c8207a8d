use std::collections::BTreeMap;

use serde::Serialize;

use crate::ast::{Decl, SetMember};
use crate::diagnostic::Diagnostic;
use crate::span::{Span, Spanned};

/// What a declared name is. Names share one namespace: redeclaring a name
/// as a different kind is a semantic error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NameKind {
    Enum,
    EnumMember,
    Set,
    Variable,
}

impl NameKind {
    fn description(&self) -> &'static str {
        match self {
            NameKind::Enum => "an enum",
            NameKind::EnumMember => "an enum member",
            NameKind::Set => "a set",
            NameKind::Variable => "an input variable",
        }
    }
}

/// One slot of the witness vector.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Slot {
    /// Index 0: the constant-one wire.
    One,
    Input { name: String, public: bool },
    Aux { label: String },
}

/// How a bare identifier resolves inside a rule expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolved {
    /// An enum member, encoded as its declaration-order value.
    Constant(u64),
    /// An input variable at this witness index.
    Variable(usize),
}

/// Name resolution state plus the single monotone witness counter.
///
/// Witness layout: index 0 is the constant one, then declared public inputs
/// in declaration order, then declared private inputs, then undeclared
/// variables in first-use order (private), then gadget auxiliaries in
/// emission order.
#[derive(Clone, Debug)]
pub struct SymbolTable {
    kinds: BTreeMap<String, NameKind>,
    members: BTreeMap<String, u64>,
    sets: BTreeMap<String, Vec<u64>>,
    variables: BTreeMap<String, usize>,
    slots: Vec<Slot>,
}

impl SymbolTable {
    /// Resolve the declaration section. Collects every semantic error it
    /// finds rather than stopping at the first.
    pub fn from_decls(decls: &[Spanned<Decl>]) -> Result<SymbolTable, Vec<Diagnostic>> {
        let mut table = SymbolTable {
            kinds: BTreeMap::new(),
            members: BTreeMap::new(),
            sets: BTreeMap::new(),
            variables: BTreeMap::new(),
            slots: vec![Slot::One],
        };
        let mut diagnostics = Vec::new();

        // Enums first: set declarations may reference their members
        for decl in decls {
            if let Decl::Enum { name, members } = &decl.node {
                table.declare_enum(name, members, &mut diagnostics);
            }
        }
        for decl in decls {
            if let Decl::Set { name, members } = &decl.node {
                table.declare_set(name, members, &mut diagnostics);
            }
        }

        // Public inputs take the low indices, then private inputs
        for decl in decls {
            if let Decl::Input { name, public: true } = &decl.node {
                table.declare_input(name, true, &mut diagnostics);
            }
        }
        for decl in decls {
            if let Decl::Input {
                name,
                public: false,
            } = &decl.node
            {
                table.declare_input(name, false, &mut diagnostics);
            }
        }

        if diagnostics.is_empty() {
            Ok(table)
        } else {
            Err(diagnostics)
        }
    }

    fn declare_enum(
        &mut self,
        name: &Spanned<String>,
        members: &[Spanned<String>],
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        if self.check_clash(&name.node, NameKind::Enum, name.span, diagnostics) {
            return;
        }
        // The enum's own name is taken before its members are processed, so
        // a member reusing it is reported as a redeclaration
        self.kinds.insert(name.node.clone(), NameKind::Enum);
        for (value, member) in members.iter().enumerate() {
            if self.check_clash(&member.node, NameKind::EnumMember, member.span, diagnostics) {
                continue;
            }
            self.kinds
                .insert(member.node.clone(), NameKind::EnumMember);
            self.members.insert(member.node.clone(), value as u64);
        }
    }

    fn declare_set(
        &mut self,
        name: &Spanned<String>,
        members: &[Spanned<SetMember>],
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        if self.check_clash(&name.node, NameKind::Set, name.span, diagnostics) {
            return;
        }
        let mut values = Vec::new();
        for member in members {
            match self.resolve_set_member(&member.node, member.span) {
                Ok(v) => values.push(v),
                Err(diag) => diagnostics.push(diag),
            }
        }
        self.kinds.insert(name.node.clone(), NameKind::Set);
        self.sets.insert(name.node.clone(), values);
    }

    fn declare_input(
        &mut self,
        name: &Spanned<String>,
        public: bool,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        if self.check_clash(&name.node, NameKind::Variable, name.span, diagnostics) {
            return;
        }
        self.kinds.insert(name.node.clone(), NameKind::Variable);
        let index = self.slots.len();
        self.slots.push(Slot::Input {
            name: name.node.clone(),
            public,
        });
        self.variables.insert(name.node.clone(), index);
    }

    /// Report a redeclaration. Returns true if the name is already taken.
    fn check_clash(
        &self,
        name: &str,
        kind: NameKind,
        span: Span,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> bool {
        if let Some(existing) = self.kinds.get(name) {
            diagnostics.push(
                Diagnostic::error(
                    format!("'{}' is already declared as {}", name, existing.description()),
                    span,
                )
                .with_note(format!("cannot redeclare it as {}", kind.description())),
            );
            return true;
        }
        false
    }

    /// Resolve a set member to its field encoding: integers stand for
    /// themselves, names must be enum members.
    pub fn resolve_set_member(&self, member: &SetMember, span: Span) -> Result<u64, Diagnostic> {
        match member {
            SetMember::Integer(n) => Ok(*n),
            SetMember::Name(name) => self.members.get(name).copied().ok_or_else(|| {
                Diagnostic::error(format!("unknown set member '{}'", name), span)
                    .with_help("set members are integers or declared enum members".to_string())
            }),
        }
    }

    /// The values of a named set, if declared.
    pub fn lookup_set(&self, name: &str) -> Option<&[u64]> {
        self.sets.get(name).map(|v| v.as_slice())
    }

    /// Resolve a bare identifier in expression position. Enum members are
    /// constants; anything else is a variable, declared on first use as a
    /// private input. Lookup is exact-match and case-sensitive.
    pub fn resolve(&mut self, name: &str, span: Span) -> Result<Resolved, Diagnostic> {
        match self.kinds.get(name) {
            Some(NameKind::EnumMember) => Ok(Resolved::Constant(self.members[name])),
            Some(NameKind::Variable) => Ok(Resolved::Variable(self.variables[name])),
            Some(kind) => Err(Diagnostic::error(
                format!("'{}' is {}, not a value", name, kind.description()),
                span,
            )),
            None => {
                self.kinds.insert(name.to_string(), NameKind::Variable);
                let index = self.slots.len();
                self.slots.push(Slot::Input {
                    name: name.to_string(),
                    public: false,
                });
                self.variables.insert(name.to_string(), index);
                Ok(Resolved::Variable(index))
            }
        }
    }

    /// Allocate an auxiliary witness slot for a gadget intermediate.
    pub fn alloc_aux(&mut self, label: String) -> usize {
        let index = self.slots.len();
        self.slots.push(Slot::Aux { label });
        index
    }

    /// Total witness length, constant-one slot included.
    pub fn num_witness(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Declared and first-use input variables as (name, witness index).
    pub fn inputs(&self) -> impl Iterator<Item = (&str, usize, bool)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| match slot {
            Slot::Input { name, public } => Some((name.as_str(), i, *public)),
            _ => None,
        })
    }
}

impl Serialize for SymbolTable {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.slots.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn table_for(source: &str) -> SymbolTable {
        let tokens = Lexer::new(source).tokenize().unwrap();
        let program = Parser::new(tokens).parse_program().unwrap();
        SymbolTable::from_decls(&program.decls).unwrap()
    }

    fn errors_for(source: &str) -> Vec<Diagnostic> {
        let tokens = Lexer::new(source).tokenize().unwrap();
        let program = Parser::new(tokens).parse_program().unwrap();
        SymbolTable::from_decls(&program.decls).unwrap_err()
    }

    #[test]
    fn test_enum_members_encode_in_declaration_order() {
        let mut table = table_for("enum Status { ACTIVE, PENDING, CLOSED }");
        assert_eq!(
            table.resolve("ACTIVE", Span::dummy()).unwrap(),
            Resolved::Constant(0)
        );
        assert_eq!(
            table.resolve("PENDING", Span::dummy()).unwrap(),
            Resolved::Constant(1)
        );
        assert_eq!(
            table.resolve("CLOSED", Span::dummy()).unwrap(),
            Resolved::Constant(2)
        );
    }

    #[test]
    fn test_public_inputs_before_private() {
        // priv declared first in source, but pub gets the lower index
        let table = table_for("priv balance\npub status");
        let inputs: Vec<_> = table.inputs().collect();
        assert_eq!(inputs, vec![("status", 1, true), ("balance", 2, false)]);
    }

    #[test]
    fn test_index_zero_is_constant_one() {
        let table = table_for("pub x");
        assert!(matches!(table.slots()[0], Slot::One));
        assert_eq!(table.num_witness(), 2);
    }

    #[test]
    fn test_first_use_variable_is_private() {
        let mut table = table_for("pub x");
        let resolved = table.resolve("y", Span::dummy()).unwrap();
        assert_eq!(resolved, Resolved::Variable(2));
        let inputs: Vec<_> = table.inputs().collect();
        assert_eq!(inputs[1], ("y", 2, false));
        // resolving again returns the same index
        assert_eq!(
            table.resolve("y", Span::dummy()).unwrap(),
            Resolved::Variable(2)
        );
    }

    #[test]
    fn test_aux_slots_follow_variables() {
        let mut table = table_for("pub x");
        let aux = table.alloc_aux("is_zero".to_string());
        assert_eq!(aux, 2);
        assert!(matches!(&table.slots()[2], Slot::Aux { label } if label == "is_zero"));
    }

    #[test]
    fn test_set_resolves_enum_members_and_integers() {
        let table = table_for("enum S { A, B }\nset allowed { B, 7 }");
        assert_eq!(table.lookup_set("allowed"), Some(&[1, 7][..]));
        assert_eq!(table.lookup_set("missing"), None);
    }

    #[test]
    fn test_error_member_variable_clash() {
        let diags = errors_for("enum S { ACTIVE }\npub ACTIVE");
        assert!(diags[0]
            .message
            .contains("'ACTIVE' is already declared as an enum member"));
    }

    #[test]
    fn test_error_member_reusing_its_enum_name() {
        // the enum's own name is taken before its members
        let diags = errors_for("enum X { X, Y }");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("'X' is already declared as an enum"));
    }

    #[test]
    fn test_error_ambiguous_member_across_enums() {
        let diags = errors_for("enum A { X }\nenum B { X }");
        assert!(diags[0].message.contains("'X' is already declared"));
    }

    #[test]
    fn test_error_unknown_set_member() {
        let diags = errors_for("set allowed { MISSING }");
        assert!(diags[0].message.contains("unknown set member 'MISSING'"));
    }

    #[test]
    fn test_errors_are_collected_not_first_only() {
        let diags = errors_for("enum A { X }\nenum B { X }\nset s { NOPE }");
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn test_enum_name_is_not_a_value() {
        let mut table = table_for("enum Status { ACTIVE }");
        let err = table.resolve("Status", Span::dummy()).unwrap_err();
        assert!(err.message.contains("not a value"));
    }
}
