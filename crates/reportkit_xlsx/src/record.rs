//! Statically declared binding tables for report data types.
//!
//! A data type opts in by implementing [`ReportRecord`] and listing its
//! bindable fields in a [`SpecFieldTable`]. Each entry pairs a
//! [`SpecReportKey`] with a typed accessor; accessors are type-erased over
//! `&dyn Any` so the filler can walk heterogeneous scopes.

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::spec::SpecReportKey;

////////////////////////////////////////////////////////////////////////////////
// #region FieldValues

/// Scalar read from a field.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumFieldValue {
    /// Text value.
    Text(String),
    /// Integer value.
    Integer(i64),
    /// Floating value.
    Float(f64),
    /// Boolean value.
    Bool(bool),
}

impl fmt::Display for EnumFieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Integer(n) => write!(f, "{n}"),
            // Whole floats keep their fraction ("10.0"), unlike integers.
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Conversion of accessor results into an optional field value.
pub trait IntoFieldValue {
    /// `None` means the field holds no data.
    fn into_field_value(self) -> Option<EnumFieldValue>;
}

impl IntoFieldValue for EnumFieldValue {
    fn into_field_value(self) -> Option<EnumFieldValue> {
        Some(self)
    }
}

impl IntoFieldValue for String {
    fn into_field_value(self) -> Option<EnumFieldValue> {
        Some(EnumFieldValue::Text(self))
    }
}

impl IntoFieldValue for &'static str {
    fn into_field_value(self) -> Option<EnumFieldValue> {
        Some(EnumFieldValue::Text(self.to_string()))
    }
}

impl IntoFieldValue for bool {
    fn into_field_value(self) -> Option<EnumFieldValue> {
        Some(EnumFieldValue::Bool(self))
    }
}

impl IntoFieldValue for f64 {
    fn into_field_value(self) -> Option<EnumFieldValue> {
        Some(EnumFieldValue::Float(self))
    }
}

impl IntoFieldValue for f32 {
    fn into_field_value(self) -> Option<EnumFieldValue> {
        Some(EnumFieldValue::Float(f64::from(self)))
    }
}

macro_rules! impl_into_field_value_integer {
    ($($ty:ty),*) => {
        $(
            impl IntoFieldValue for $ty {
                fn into_field_value(self) -> Option<EnumFieldValue> {
                    Some(EnumFieldValue::Integer(i64::from(self)))
                }
            }
        )*
    };
}

impl_into_field_value_integer!(i8, i16, i32, i64, u8, u16, u32);

impl IntoFieldValue for u64 {
    fn into_field_value(self) -> Option<EnumFieldValue> {
        Some(match i64::try_from(self) {
            Ok(n) => EnumFieldValue::Integer(n),
            Err(_) => EnumFieldValue::Float(self as f64),
        })
    }
}

impl IntoFieldValue for usize {
    fn into_field_value(self) -> Option<EnumFieldValue> {
        (self as u64).into_field_value()
    }
}

impl<V: IntoFieldValue> IntoFieldValue for Option<V> {
    fn into_field_value(self) -> Option<EnumFieldValue> {
        self.and_then(IntoFieldValue::into_field_value)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Accessors

/// Why an accessor produced no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumAccessError {
    /// The scope object is not of the declaring type.
    ScopeMismatch {
        /// Declaring type the accessor expects.
        expected: &'static str,
    },
    /// The accessor ran against the right type but could not read the field.
    Unavailable(String),
}

/// Type-erased scalar reader.
pub type FnReadValue =
    Arc<dyn Fn(&dyn Any) -> Result<Option<EnumFieldValue>, EnumAccessError> + Send + Sync>;

/// Type-erased list reader yielding borrowed elements.
pub type FnReadList = Arc<
    dyn for<'a> Fn(&'a dyn Any) -> Result<Option<Vec<&'a dyn Any>>, EnumAccessError>
        + Send
        + Sync,
>;

/// Descriptor of a record type: identity, display name and field table.
#[derive(Clone, Copy)]
pub struct SpecTypeInfo {
    /// Runtime identity, used to visit each type once.
    pub type_id: TypeId,
    /// Short type name used in derived key names.
    pub type_name: &'static str,
    declare: fn() -> Vec<SpecFieldDecl>,
}

impl SpecTypeInfo {
    /// Descriptor of `T`.
    pub fn of<T: ReportRecord>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: T::type_name(),
            declare: derive_field_decls::<T>,
        }
    }

    /// Evaluate the type's field table.
    pub fn declare_fields(&self) -> Vec<SpecFieldDecl> {
        (self.declare)()
    }
}

impl fmt::Debug for SpecTypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecTypeInfo")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Field shape seen by the schema builder.
#[derive(Clone)]
pub enum EnumFieldAccessor {
    /// Scalar field.
    Value(FnReadValue),
    /// List field of `element` records.
    List {
        /// Element reader.
        read: FnReadList,
        /// Element type descriptor.
        element: SpecTypeInfo,
    },
}

impl fmt::Debug for EnumFieldAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(_) => f.write_str("Value(..)"),
            Self::List { element, .. } => write!(f, "List<{}>(..)", element.type_name),
        }
    }
}

/// One declared field.
#[derive(Debug, Clone)]
pub struct SpecFieldDecl {
    /// Field name as declared.
    pub field_name: String,
    /// Key declaration.
    pub key: SpecReportKey,
    /// Typed accessor.
    pub accessor: EnumFieldAccessor,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Registry

/// Data type whose fields can be bound to template placeholders.
pub trait ReportRecord: Any {
    /// Name used in derived key names; defaults to the unqualified type name.
    fn type_name() -> &'static str
    where
        Self: Sized,
    {
        derive_short_type_name(std::any::type_name::<Self>())
    }

    /// Register bindable fields.
    fn declare_keys(keys: &mut SpecFieldTable<Self>)
    where
        Self: Sized;
}

/// Field registry filled by [`ReportRecord::declare_keys`].
pub struct SpecFieldTable<T> {
    l_decls: Vec<SpecFieldDecl>,
    _marker: PhantomData<fn(&T)>,
}

impl<T: ReportRecord> Default for SpecFieldTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ReportRecord> SpecFieldTable<T> {
    /// Empty table.
    pub fn new() -> Self {
        Self {
            l_decls: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Register a scalar field.
    pub fn single<V, F>(&mut self, field_name: &str, key: SpecReportKey, read: F) -> &mut Self
    where
        V: IntoFieldValue,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.single_fallible(field_name, key, move |obj| Ok::<V, String>(read(obj)))
    }

    /// Register a scalar field whose reader may fail.
    ///
    /// A failure is reported as [`EnumAccessError::Unavailable`].
    pub fn single_fallible<V, F>(
        &mut self,
        field_name: &str,
        key: SpecReportKey,
        read: F,
    ) -> &mut Self
    where
        V: IntoFieldValue,
        F: Fn(&T) -> Result<V, String> + Send + Sync + 'static,
    {
        let fn_read: FnReadValue = Arc::new(move |obj: &dyn Any| {
            let record = downcast_record::<T>(obj)?;
            read(record)
                .map(IntoFieldValue::into_field_value)
                .map_err(EnumAccessError::Unavailable)
        });
        self.field(field_name, key, EnumFieldAccessor::Value(fn_read))
    }

    /// Register a list field of `E` records.
    pub fn list<E, F>(&mut self, field_name: &str, key: SpecReportKey, read: F) -> &mut Self
    where
        E: ReportRecord,
        F: for<'a> Fn(&'a T) -> Option<&'a [E]> + Send + Sync + 'static,
    {
        self.list_fallible(field_name, key, move |obj| Ok(read(obj)))
    }

    /// Register a list field whose reader may fail.
    pub fn list_fallible<E, F>(&mut self, field_name: &str, key: SpecReportKey, read: F) -> &mut Self
    where
        E: ReportRecord,
        F: for<'a> Fn(&'a T) -> Result<Option<&'a [E]>, String> + Send + Sync + 'static,
    {
        let fn_read = derive_list_reader(move |obj| {
            let record = downcast_record::<T>(obj)?;
            let l_elements = read(record).map_err(EnumAccessError::Unavailable)?;
            Ok(l_elements.map(|l_elements| {
                l_elements
                    .iter()
                    .map(|element| element as &dyn Any)
                    .collect::<Vec<_>>()
            }))
        });
        self.field(
            field_name,
            key,
            EnumFieldAccessor::List {
                read: fn_read,
                element: SpecTypeInfo::of::<E>(),
            },
        )
    }

    /// Register a field with a prebuilt accessor.
    pub fn field(
        &mut self,
        field_name: &str,
        key: SpecReportKey,
        accessor: EnumFieldAccessor,
    ) -> &mut Self {
        self.l_decls.push(SpecFieldDecl {
            field_name: field_name.to_string(),
            key,
            accessor,
        });
        self
    }

    /// Consume the table.
    pub fn into_decls(self) -> Vec<SpecFieldDecl> {
        self.l_decls
    }
}

fn derive_field_decls<T: ReportRecord>() -> Vec<SpecFieldDecl> {
    let mut table = SpecFieldTable::<T>::new();
    T::declare_keys(&mut table);
    table.into_decls()
}

fn derive_list_reader<F>(read: F) -> FnReadList
where
    F: for<'a> Fn(&'a dyn Any) -> Result<Option<Vec<&'a dyn Any>>, EnumAccessError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(read)
}

fn downcast_record<T: ReportRecord>(obj: &dyn Any) -> Result<&T, EnumAccessError> {
    obj.downcast_ref::<T>()
        .ok_or(EnumAccessError::ScopeMismatch {
            expected: T::type_name(),
        })
}

/// Strip module path and generic arguments from a type name.
pub fn derive_short_type_name(full_name: &'static str) -> &'static str {
    let c_base = match full_name.find('<') {
        Some(n_idx) => &full_name[..n_idx],
        None => full_name,
    };
    match c_base.rfind("::") {
        Some(n_idx) => &c_base[n_idx + 2..],
        None => c_base,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    struct Point {
        x: Option<String>,
    }

    impl ReportRecord for Point {
        fn declare_keys(keys: &mut SpecFieldTable<Self>) {
            keys.single("x", SpecReportKey::single(), |p: &Point| p.x.clone());
        }
    }

    struct Line {
        points: Vec<Point>,
    }

    impl ReportRecord for Line {
        fn declare_keys(keys: &mut SpecFieldTable<Self>) {
            keys.list("points", SpecReportKey::complex(), |l: &Line| {
                Some(l.points.as_slice())
            });
        }
    }

    #[test]
    fn short_type_name_strips_path_and_generics() {
        assert_eq!(derive_short_type_name("a::b::DataSet"), "DataSet");
        assert_eq!(derive_short_type_name("Wrapper<a::Inner>"), "Wrapper");
        assert_eq!(derive_short_type_name("Plain"), "Plain");
        assert_eq!(Point::type_name(), "Point");
    }

    #[test]
    fn value_accessor_reads_and_detects_scope_mismatch() {
        let l_decls = SpecTypeInfo::of::<Point>().declare_fields();
        let EnumFieldAccessor::Value(read) = &l_decls[0].accessor else {
            panic!("expected scalar accessor");
        };

        let point = Point {
            x: Some("1".to_string()),
        };
        assert_eq!(
            read(&point).unwrap(),
            Some(EnumFieldValue::Text("1".to_string()))
        );
        assert_eq!(read(&Point { x: None }).unwrap(), None);

        let line = Line { points: vec![] };
        assert_eq!(
            read(&line),
            Err(EnumAccessError::ScopeMismatch { expected: "Point" })
        );
    }

    #[test]
    fn list_accessor_yields_borrowed_elements() {
        let l_decls = SpecTypeInfo::of::<Line>().declare_fields();
        let EnumFieldAccessor::List { read, element } = &l_decls[0].accessor else {
            panic!("expected list accessor");
        };
        assert_eq!(element.type_name, "Point");

        let line = Line {
            points: vec![Point { x: None }, Point { x: None }],
        };
        let l_elements = read(&line).unwrap().unwrap();
        assert_eq!(l_elements.len(), 2);
        assert!(l_elements[0].downcast_ref::<Point>().is_some());
    }

    #[test]
    fn option_and_numeric_conversions() {
        assert_eq!(Some(3_i32).into_field_value(), Some(EnumFieldValue::Integer(3)));
        assert_eq!(None::<f64>.into_field_value(), None);
        assert_eq!(10.5_f32.into_field_value(), Some(EnumFieldValue::Float(10.5)));
        assert_eq!(
            u64::MAX.into_field_value(),
            Some(EnumFieldValue::Float(u64::MAX as f64))
        );
        assert_eq!(EnumFieldValue::Float(10.5).to_string(), "10.5");
    }

    #[test]
    fn whole_floats_render_with_fraction() {
        assert_eq!(EnumFieldValue::Float(10.0).to_string(), "10.0");
        assert_eq!(EnumFieldValue::Float(-3.0).to_string(), "-3.0");
        assert_eq!(EnumFieldValue::Integer(10).to_string(), "10");
        assert_eq!(10.0_f64.into_field_value().unwrap().to_string(), "10.0");
    }
}
