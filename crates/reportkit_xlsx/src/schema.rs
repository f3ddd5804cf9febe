//! Key schema: every key reachable from a root record type.

use std::any::{Any, TypeId};
use std::collections::{BTreeSet, HashSet, VecDeque};

use indexmap::IndexMap;
use tracing::debug;

use crate::conf::{C_KEY_COUNTER, C_PREFIX_KEY_COMPLEX, C_PREFIX_KEY_SINGLE};
use crate::record::{
    EnumAccessError, EnumFieldAccessor, EnumFieldValue, ReportRecord, SpecFieldDecl, SpecTypeInfo,
};
use crate::spec::{EnumDataType, EnumKeyKind, ReportError, SpecReportKey};

////////////////////////////////////////////////////////////////////////////////
// #region KeyBinding

/// Resolved key: final name and description plus the field it reads.
#[derive(Debug, Clone)]
pub struct SpecKeyBinding {
    /// Final key name (placeholder text).
    pub name: String,
    /// Final description.
    pub description: String,
    /// Declaration as written on the field.
    pub key: SpecReportKey,
    /// Declaring type name.
    pub type_name: &'static str,
    /// Declaring field name.
    pub field_name: String,
    /// Field accessor.
    pub accessor: EnumFieldAccessor,
}

impl SpecKeyBinding {
    /// Binding kind.
    pub fn key_kind(&self) -> EnumKeyKind {
        self.key.key_kind
    }

    /// Coercion target.
    pub fn data_type(&self) -> EnumDataType {
        self.key.data_type
    }

    /// Whether absence removes the placeholder.
    pub fn if_temporary(&self) -> bool {
        self.key.if_temporary
    }

    /// Pattern used when a temporal value is rendered as text.
    pub fn temporal_pattern(&self) -> &str {
        match self.key.data_type {
            EnumDataType::Time => &self.key.time_pattern,
            _ => &self.key.date_pattern,
        }
    }

    /// Read the scalar value from `scope`.
    pub fn read_value(&self, scope: &dyn Any) -> Result<Option<EnumFieldValue>, EnumAccessError> {
        match &self.accessor {
            EnumFieldAccessor::Value(read) => read(scope),
            EnumFieldAccessor::List { .. } => Err(EnumAccessError::Unavailable(format!(
                "key {:?} is bound to a list field",
                self.name
            ))),
        }
    }

    /// Read the list elements from `scope`.
    pub fn read_list<'a>(
        &self,
        scope: &'a dyn Any,
    ) -> Result<Option<Vec<&'a dyn Any>>, EnumAccessError> {
        match &self.accessor {
            EnumFieldAccessor::List { read, .. } => read(scope),
            EnumFieldAccessor::Value(_) => Err(EnumAccessError::Unavailable(format!(
                "key {:?} is bound to a scalar field",
                self.name
            ))),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region KeySchema

/// Mapping from unique key name to binding, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct KeySchema {
    dict_bindings: IndexMap<String, SpecKeyBinding>,
    set_keys_complex: BTreeSet<String>,
    l_types_visited: Vec<&'static str>,
}

impl KeySchema {
    /// Build the schema reachable from `T`.
    pub fn build<T: ReportRecord>() -> Result<Self, ReportError> {
        Self::build_from(SpecTypeInfo::of::<T>())
    }

    /// Build the schema reachable from a type descriptor.
    ///
    /// Types are visited breadth-first, each at most once, so recursive
    /// element types terminate.
    pub fn build_from(root: SpecTypeInfo) -> Result<Self, ReportError> {
        let mut schema = Self::default();
        let mut set_types_seen: HashSet<TypeId> = HashSet::new();
        let mut queue_types: VecDeque<SpecTypeInfo> = VecDeque::new();

        set_types_seen.insert(root.type_id);
        queue_types.push_back(root);

        while let Some(type_info) = queue_types.pop_front() {
            schema.l_types_visited.push(type_info.type_name);
            for decl in type_info.declare_fields() {
                if let EnumFieldAccessor::List { element, .. } = &decl.accessor
                    && set_types_seen.insert(element.type_id)
                {
                    queue_types.push_back(*element);
                }
                schema.insert_decl(type_info.type_name, decl)?;
            }
        }

        debug!(
            n_keys = schema.dict_bindings.len(),
            n_complex = schema.set_keys_complex.len(),
            n_types = schema.l_types_visited.len(),
            "key schema built"
        );
        Ok(schema)
    }

    fn insert_decl(&mut self, type_name: &'static str, decl: SpecFieldDecl) -> Result<(), ReportError> {
        validate_key_placement(type_name, &decl)?;

        let c_name = derive_key_name(type_name, &decl);
        if c_name == C_KEY_COUNTER || self.dict_bindings.contains_key(&c_name) {
            return Err(ReportError::DuplicateKey { key: c_name });
        }

        let c_description = decl
            .key
            .description
            .clone()
            .unwrap_or_else(|| format!("object: {type_name}, field: {}", decl.field_name));

        if decl.key.key_kind == EnumKeyKind::Complex {
            self.set_keys_complex.insert(c_name.clone());
        }
        self.dict_bindings.insert(
            c_name.clone(),
            SpecKeyBinding {
                name: c_name,
                description: c_description,
                key: decl.key,
                type_name,
                field_name: decl.field_name,
                accessor: decl.accessor,
            },
        );
        Ok(())
    }

    /// Binding for `name`.
    pub fn get(&self, name: &str) -> Option<&SpecKeyBinding> {
        self.dict_bindings.get(name)
    }

    /// Whether `name` is a key.
    pub fn contains(&self, name: &str) -> bool {
        self.dict_bindings.contains_key(name)
    }

    /// Whether `name` is a complex key.
    pub fn is_complex(&self, name: &str) -> bool {
        self.set_keys_complex.contains(name)
    }

    /// Whether `text` is a placeholder: a key name or the counter.
    pub fn is_placeholder(&self, text: &str) -> bool {
        text == C_KEY_COUNTER || self.contains(text)
    }

    /// All bindings in discovery order.
    pub fn bindings(&self) -> impl Iterator<Item = &SpecKeyBinding> {
        self.dict_bindings.values()
    }

    /// Complex key names in discovery order.
    pub fn complex_keys(&self) -> impl Iterator<Item = &str> {
        self.dict_bindings
            .values()
            .filter(|binding| binding.key_kind() == EnumKeyKind::Complex)
            .map(|binding| binding.name.as_str())
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.dict_bindings.len()
    }

    /// Whether the schema has no keys.
    pub fn is_empty(&self) -> bool {
        self.dict_bindings.is_empty()
    }

    /// Types visited while building, in visit order.
    pub fn types_visited(&self) -> &[&'static str] {
        &self.l_types_visited
    }
}

fn derive_key_name(type_name: &str, decl: &SpecFieldDecl) -> String {
    if let Some(c_name) = &decl.key.name {
        return c_name.clone();
    }
    let c_prefix = match decl.key.key_kind {
        EnumKeyKind::Single => C_PREFIX_KEY_SINGLE,
        EnumKeyKind::Complex => C_PREFIX_KEY_COMPLEX,
    };
    format!("{c_prefix}{type_name}_{}", decl.field_name)
}

fn validate_key_placement(type_name: &str, decl: &SpecFieldDecl) -> Result<(), ReportError> {
    let c_message = match (&decl.key.key_kind, &decl.accessor) {
        (EnumKeyKind::Complex, EnumFieldAccessor::Value(_)) => {
            "a complex key must be placed on a list field"
        }
        (EnumKeyKind::Single, EnumFieldAccessor::List { .. }) => {
            "a single key cannot be placed on a list field"
        }
        _ => return Ok(()),
    };
    Err(ReportError::InvalidKeyPlacement {
        type_name: type_name.to_string(),
        field_name: decl.field_name.clone(),
        message: c_message.to_string(),
    })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SpecFieldTable;
    use pretty_assertions::assert_eq;

    struct Row {
        name: String,
        children: Vec<Row>,
    }

    impl ReportRecord for Row {
        fn declare_keys(keys: &mut SpecFieldTable<Self>) {
            keys.single("name", SpecReportKey::single(), |r: &Row| r.name.clone())
                .list("children", SpecReportKey::complex(), |r: &Row| {
                    Some(r.children.as_slice())
                });
        }
    }

    struct Root {
        title: String,
        rows: Vec<Row>,
    }

    impl ReportRecord for Root {
        fn declare_keys(keys: &mut SpecFieldTable<Self>) {
            keys.single(
                "title",
                SpecReportKey::single().named("title").described("Report title"),
                |r: &Root| r.title.clone(),
            )
            .list("rows", SpecReportKey::complex().named("rows"), |r: &Root| {
                Some(r.rows.as_slice())
            });
        }
    }

    #[test]
    fn builds_names_descriptions_and_terminates_on_recursive_types() {
        let schema = KeySchema::build::<Root>().unwrap();

        let l_names: Vec<&str> = schema.bindings().map(|b| b.name.as_str()).collect();
        assert_eq!(
            l_names,
            vec!["title", "rows", "key_Row_name", "complex_Row_children"]
        );
        assert_eq!(schema.types_visited(), &["Root", "Row"]);

        assert_eq!(schema.get("title").unwrap().description, "Report title");
        assert_eq!(
            schema.get("key_Row_name").unwrap().description,
            "object: Row, field: name"
        );
        assert!(schema.is_complex("rows"));
        assert!(schema.is_complex("complex_Row_children"));
        assert!(!schema.is_complex("title"));
        assert!(schema.is_placeholder("key_counter"));
        assert!(!schema.is_placeholder("Title"));
        assert_eq!(
            schema.complex_keys().collect::<Vec<_>>(),
            vec!["rows", "complex_Row_children"]
        );
    }

    struct Clash {
        a: String,
        b: String,
    }

    impl ReportRecord for Clash {
        fn declare_keys(keys: &mut SpecFieldTable<Self>) {
            keys.single("a", SpecReportKey::single().named("same"), |c: &Clash| c.a.clone())
                .single("b", SpecReportKey::single().named("same"), |c: &Clash| c.b.clone());
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = KeySchema::build::<Clash>().unwrap_err();
        assert!(matches!(err, ReportError::DuplicateKey { key } if key == "same"));
    }

    struct CounterClash;

    impl ReportRecord for CounterClash {
        fn declare_keys(keys: &mut SpecFieldTable<Self>) {
            keys.single("n", SpecReportKey::single().named("key_counter"), |_| 1_i32);
        }
    }

    #[test]
    fn counter_name_is_reserved() {
        assert!(matches!(
            KeySchema::build::<CounterClash>(),
            Err(ReportError::DuplicateKey { .. })
        ));
    }

    struct Misplaced {
        value: String,
    }

    impl ReportRecord for Misplaced {
        fn declare_keys(keys: &mut SpecFieldTable<Self>) {
            keys.single("value", SpecReportKey::complex(), |m: &Misplaced| {
                m.value.clone()
            });
        }
    }

    struct MisplacedList {
        rows: Vec<Row>,
    }

    impl ReportRecord for MisplacedList {
        fn declare_keys(keys: &mut SpecFieldTable<Self>) {
            keys.list("rows", SpecReportKey::single(), |m: &MisplacedList| {
                Some(m.rows.as_slice())
            });
        }
    }

    #[test]
    fn key_kind_must_match_field_shape() {
        let err = KeySchema::build::<Misplaced>().unwrap_err();
        assert!(matches!(
            err,
            ReportError::InvalidKeyPlacement { ref type_name, ref field_name, .. }
                if type_name == "Misplaced" && field_name == "value"
        ));
        assert!(matches!(
            KeySchema::build::<MisplacedList>(),
            Err(ReportError::InvalidKeyPlacement { .. })
        ));
    }

    struct NestedClash {
        title: String,
    }

    impl ReportRecord for NestedClash {
        fn declare_keys(keys: &mut SpecFieldTable<Self>) {
            keys.single("title", SpecReportKey::single().named("title"), |n: &NestedClash| {
                n.title.clone()
            });
        }
    }

    struct RootNestedClash {
        title: String,
        parts: Vec<NestedClash>,
    }

    impl ReportRecord for RootNestedClash {
        fn declare_keys(keys: &mut SpecFieldTable<Self>) {
            keys.single(
                "title",
                SpecReportKey::single().named("title"),
                |r: &RootNestedClash| r.title.clone(),
            )
            .list(
                "parts",
                SpecReportKey::complex().named("parts"),
                |r: &RootNestedClash| Some(r.parts.as_slice()),
            );
        }
    }

    #[test]
    fn duplicate_across_nested_types_is_rejected() {
        let err = KeySchema::build::<RootNestedClash>().unwrap_err();
        assert!(matches!(err, ReportError::DuplicateKey { key } if key == "title"));
    }

    struct RootNestedMisplaced {
        rows: Vec<Misplaced>,
    }

    impl ReportRecord for RootNestedMisplaced {
        fn declare_keys(keys: &mut SpecFieldTable<Self>) {
            keys.list(
                "rows",
                SpecReportKey::complex().named("rows"),
                |r: &RootNestedMisplaced| Some(r.rows.as_slice()),
            );
        }
    }

    struct RootNestedMisplacedList {
        groups: Vec<MisplacedList>,
    }

    impl ReportRecord for RootNestedMisplacedList {
        fn declare_keys(keys: &mut SpecFieldTable<Self>) {
            keys.list(
                "groups",
                SpecReportKey::complex().named("groups"),
                |r: &RootNestedMisplacedList| Some(r.groups.as_slice()),
            );
        }
    }

    #[test]
    fn misplaced_key_on_nested_type_is_rejected() {
        let err = KeySchema::build::<RootNestedMisplaced>().unwrap_err();
        assert!(matches!(
            err,
            ReportError::InvalidKeyPlacement { ref type_name, ref field_name, .. }
                if type_name == "Misplaced" && field_name == "value"
        ));

        let err = KeySchema::build::<RootNestedMisplacedList>().unwrap_err();
        assert!(matches!(
            err,
            ReportError::InvalidKeyPlacement { ref type_name, ref field_name, .. }
                if type_name == "MisplacedList" && field_name == "rows"
        ));
    }
}
