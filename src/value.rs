use std::borrow::Cow;
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::kinds::{ErrorValue, Pattern, RangeValue, Ratio, Record, Timestamp, Token};
use crate::Integer;

/// Named attributes of an object, in insertion order.
pub type Fields = IndexMap<String, Value>;

/// Entries of a mapping, in insertion order.
pub type Entries = IndexMap<String, Value>;

/// A runtime value.
///
/// Scalars are plain data and carry no identity. Aggregates (`Seq`, `Map`, `Object`) are shared
/// handles: cloning one clones the handle, not the contents, so two branches of a graph can point
/// at the same aggregate and an aggregate can contain itself.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(Integer),
    Float(f64),
    Str(String),
    Seq(Seq),
    Map(Map),
    Object(Object),
    Callable(Callable),
}

/// Shared handle to a growable sequence.
#[derive(Clone, Default)]
pub struct Seq(Rc<RefCell<Vec<Value>>>);

/// Shared handle to a string-keyed mapping.
#[derive(Clone, Default)]
pub struct Map(Rc<RefCell<Entries>>);

/// Shared handle to a typed instance.
#[derive(Clone)]
pub struct Object(Rc<RefCell<Instance>>);

/// An executable value. Callables can live in a graph, but never serialize.
#[derive(Clone)]
pub struct Callable(Rc<dyn Fn(&[Value]) -> Value>);

/// The contents of an [`Object`]: a type name, resolved through the registry on decode, and a
/// body.
#[derive(Clone)]
pub struct Instance {
    type_name: String,
    body: Body,
}

/// Instance payload. Generic objects carry named fields; every other variant is one of the
/// special kinds with its own fixed field set.
#[derive(Clone)]
pub enum Body {
    Fields(Fields),
    Time(Timestamp),
    Ratio(Ratio),
    Pattern(Pattern),
    Range(RangeValue),
    Token(Token),
    Record(Record),
    Error(ErrorValue),
}

impl Seq {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(values: Vec<Value>) -> Self {
        Seq(Rc::new(RefCell::new(values)))
    }

    pub fn push<V: Into<Value>>(&self, value: V) {
        self.0.borrow_mut().push(value.into());
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn borrow(&self) -> Ref<'_, Vec<Value>> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Vec<Value>> {
        self.0.borrow_mut()
    }

    /// Whether both handles point at the same sequence.
    pub fn ptr_eq(&self, other: &Seq) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    #[cfg(test)]
    pub(crate) fn handle_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Entries) -> Self {
        Map(Rc::new(RefCell::new(entries)))
    }

    pub fn insert<K: Into<String>, V: Into<Value>>(&self, key: K, value: V) -> Option<Value> {
        self.0.borrow_mut().insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn borrow(&self) -> Ref<'_, Entries> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Entries> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &Map) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl Object {
    pub fn new(instance: Instance) -> Self {
        Object(Rc::new(RefCell::new(instance)))
    }

    /// Create a generic object with no fields yet.
    pub fn generic<S: Into<String>>(type_name: S) -> Self {
        Self::new(Instance::generic(type_name))
    }

    pub fn type_name(&self) -> String {
        self.0.borrow().type_name.clone()
    }

    /// Look up a named field of a generic object.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.0.borrow().fields().and_then(|f| f.get(field).cloned())
    }

    /// Set a named field on a generic object. Returns false if the instance is a special kind,
    /// which has no free-form fields.
    pub fn set<K: Into<String>, V: Into<Value>>(&self, field: K, value: V) -> bool {
        match self.0.borrow_mut().fields_mut() {
            Some(fields) => {
                fields.insert(field.into(), value.into());
                true
            }
            None => false,
        }
    }

    pub fn borrow(&self) -> Ref<'_, Instance> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Instance> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl Callable {
    pub fn new<F: Fn(&[Value]) -> Value + 'static>(f: F) -> Self {
        Callable(Rc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }

    pub fn ptr_eq(&self, other: &Callable) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Instance {
    pub fn new<S: Into<String>>(type_name: S, body: Body) -> Self {
        Self {
            type_name: type_name.into(),
            body,
        }
    }

    pub fn generic<S: Into<String>>(type_name: S) -> Self {
        Self::new(type_name, Body::Fields(Fields::new()))
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn fields(&self) -> Option<&Fields> {
        match self.body {
            Body::Fields(ref f) => Some(f),
            _ => None,
        }
    }

    pub fn fields_mut(&mut self) -> Option<&mut Fields> {
        match self.body {
            Body::Fields(ref mut f) => Some(f),
            _ => None,
        }
    }

    /// Drop every handle this instance holds, so reference cycles through it can be reclaimed.
    pub(crate) fn dismantle(&mut self) {
        match self.body {
            Body::Fields(ref mut f) => f.clear(),
            Body::Range(ref mut r) => r.dismantle(),
            Body::Record(ref mut r) => r.dismantle(),
            Body::Error(ref mut e) => e.dismantle(),
            Body::Time(_) | Body::Ratio(_) | Body::Pattern(_) | Body::Token(_) => (),
        }
    }
}

impl Value {
    /// Build a fresh sequence.
    pub fn seq<I: IntoIterator<Item = V>, V: Into<Value>>(items: I) -> Value {
        Value::Seq(Seq::from_vec(items.into_iter().map(Into::into).collect()))
    }

    /// Build a fresh mapping.
    pub fn map<I, K, V>(entries: I) -> Value
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Map(Map::from_entries(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    /// Build a fresh generic object.
    pub fn object<S, I, K, V>(type_name: S, fields: I) -> Value
    where
        S: Into<String>,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Value::Object(Object::new(Instance::new(type_name, Body::Fields(fields))))
    }

    pub fn callable<F: Fn(&[Value]) -> Value + 'static>(f: F) -> Value {
        Value::Callable(Callable::new(f))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Value::Int(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    pub fn is_str(&self) -> bool {
        matches!(self, Value::Str(_))
    }

    pub fn is_seq(&self) -> bool {
        matches!(self, Value::Seq(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Callable(_))
    }

    /// Scalars are inlined on the wire and never take a store slot.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_)
        )
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Bool(val) = *self {
            Some(val)
        } else {
            None
        }
    }

    pub fn as_int(&self) -> Option<Integer> {
        if let Value::Int(val) = *self {
            Some(val)
        } else {
            None
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(ref n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Int(ref n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(n) => Some(n),
            Value::Int(ref n) => Some(n.as_f64()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        if let Value::Str(ref val) = *self {
            Some(val.as_str())
        } else {
            None
        }
    }

    pub fn as_seq(&self) -> Option<&Seq> {
        if let Value::Seq(ref val) = *self {
            Some(val)
        } else {
            None
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        if let Value::Map(ref val) = *self {
            Some(val)
        } else {
            None
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        if let Value::Object(ref val) = *self {
            Some(val)
        } else {
            None
        }
    }

    /// Type name of an object value.
    pub fn type_name(&self) -> Option<String> {
        self.as_object().map(Object::type_name)
    }

    pub fn as_timestamp(&self) -> Option<Timestamp> {
        match self.as_object()?.borrow().body() {
            Body::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_ratio(&self) -> Option<Ratio> {
        match self.as_object()?.borrow().body() {
            Body::Ratio(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_pattern(&self) -> Option<Pattern> {
        match self.as_object()?.borrow().body() {
            Body::Pattern(p) => Some(p.clone()),
            _ => None,
        }
    }

    pub fn as_token(&self) -> Option<Token> {
        match self.as_object()?.borrow().body() {
            Body::Token(t) => Some(t.clone()),
            _ => None,
        }
    }

    /// Element `index` of a sequence, or `Null` when absent.
    pub fn at(&self, index: usize) -> Value {
        self.as_seq()
            .and_then(|s| s.get(index))
            .unwrap_or(Value::Null)
    }

    /// Entry of a mapping or field of a generic object, or `Null` when absent.
    pub fn field(&self, key: &str) -> Value {
        match self {
            Value::Map(m) => m.get(key),
            Value::Object(o) => o.get(key),
            _ => None,
        }
        .unwrap_or(Value::Null)
    }

    /// Allocation address of an aggregate; scalars have none.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Seq(s) => Some(s.addr()),
            Value::Map(m) => Some(m.addr()),
            Value::Object(o) => Some(o.addr()),
            _ => None,
        }
    }

    /// Reference identity: true only when both are handles to the same aggregate.
    pub fn same(&self, other: &Value) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

/// Deep equality. Aggregates compare by contents; a pair of aggregates already under comparison
/// is assumed equal, so cyclic graphs of the same shape compare equal instead of looping.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        GraphEq::default().values(self, other)
    }
}

#[derive(Default)]
struct GraphEq {
    assumed: HashSet<(usize, usize)>,
}

impl GraphEq {
    fn values(&mut self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Int(x), Value::Int(y)) => x == y,
            (Value::Float(x), Value::Float(y)) => x == y,
            (Value::Str(x), Value::Str(y)) => x == y,
            (Value::Seq(x), Value::Seq(y)) => self.seqs(x, y),
            (Value::Map(x), Value::Map(y)) => {
                if !self.assumed.insert((x.addr(), y.addr())) {
                    return true;
                }
                self.entries(&x.borrow(), &y.borrow())
            }
            (Value::Object(x), Value::Object(y)) => {
                if !self.assumed.insert((x.addr(), y.addr())) {
                    return true;
                }
                let (x, y) = (x.borrow(), y.borrow());
                x.type_name == y.type_name && self.bodies(&x.body, &y.body)
            }
            (Value::Callable(x), Value::Callable(y)) => x.ptr_eq(y),
            _ => false,
        }
    }

    fn seqs(&mut self, x: &Seq, y: &Seq) -> bool {
        if !self.assumed.insert((x.addr(), y.addr())) {
            return true;
        }
        let (x, y) = (x.borrow(), y.borrow());
        x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| self.values(a, b))
    }

    fn entries(&mut self, x: &Entries, y: &Entries) -> bool {
        x.len() == y.len()
            && x.iter().all(|(k, a)| match y.get(k) {
                Some(b) => self.values(a, b),
                None => false,
            })
    }

    fn bodies(&mut self, x: &Body, y: &Body) -> bool {
        match (x, y) {
            (Body::Fields(x), Body::Fields(y)) => self.entries(x, y),
            (Body::Time(x), Body::Time(y)) => x == y,
            (Body::Ratio(x), Body::Ratio(y)) => x == y,
            (Body::Pattern(x), Body::Pattern(y)) => x == y,
            (Body::Token(x), Body::Token(y)) => x == y,
            (Body::Range(x), Body::Range(y)) => {
                x.exclusive() == y.exclusive()
                    && self.values(x.start(), y.start())
                    && self.values(x.end(), y.end())
            }
            (Body::Record(x), Body::Record(y)) => self.seqs(x.values(), y.values()),
            (Body::Error(x), Body::Error(y)) => {
                x.message() == y.message() && self.seqs(x.trace(), y.trace())
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = RefCell::new(Vec::new());
        DebugGraph { value: self, path: &path }.fmt(f)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&Value::Object(self.clone()), f)
    }
}

/// Debug printer that marks revisits of an aggregate on the current path as `<cycle>`.
struct DebugGraph<'a> {
    value: &'a Value,
    path: &'a RefCell<Vec<usize>>,
}

impl<'a> DebugGraph<'a> {
    fn child<'b>(&self, value: &'b Value) -> DebugGraph<'b>
    where
        'a: 'b,
    {
        DebugGraph {
            value,
            path: self.path,
        }
    }

    fn aggregate(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Value::Seq(s) => f
                .debug_list()
                .entries(s.borrow().iter().map(|v| self.child(v)))
                .finish(),
            Value::Map(m) => f
                .debug_map()
                .entries(m.borrow().iter().map(|(k, v)| (k, self.child(v))))
                .finish(),
            Value::Object(o) => {
                let inst = o.borrow();
                match inst.body() {
                    Body::Fields(fields) => {
                        let mut s = f.debug_struct(inst.type_name());
                        for (k, v) in fields {
                            s.field(k, &self.child(v));
                        }
                        s.finish()
                    }
                    Body::Time(t) => write!(f, "{}({})", inst.type_name(), t),
                    Body::Ratio(r) => write!(f, "{}({})", inst.type_name(), r),
                    Body::Pattern(p) => write!(f, "{}({:?})", inst.type_name(), p),
                    Body::Token(t) => write!(f, "{}({:?})", inst.type_name(), t.name()),
                    Body::Range(r) => f
                        .debug_struct(inst.type_name())
                        .field("start", &self.child(r.start()))
                        .field("end", &self.child(r.end()))
                        .field("exclusive", &r.exclusive())
                        .finish(),
                    Body::Record(r) => {
                        let values = Value::Seq(r.values().clone());
                        f.debug_tuple(inst.type_name())
                            .field(&self.child(&values))
                            .finish()
                    }
                    Body::Error(e) => {
                        let trace = Value::Seq(e.trace().clone());
                        f.debug_struct(inst.type_name())
                            .field("message", &e.message())
                            .field("trace", &self.child(&trace))
                            .finish()
                    }
                }
            }
            _ => Ok(()),
        }
    }
}

impl<'a> fmt::Debug for DebugGraph<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Value::Null => f.write_str("Null"),
            Value::Bool(v) => fmt::Debug::fmt(v, f),
            Value::Int(v) => fmt::Debug::fmt(v, f),
            Value::Float(v) => fmt::Debug::fmt(v, f),
            Value::Str(v) => fmt::Debug::fmt(v, f),
            Value::Callable(_) => f.write_str("<callable>"),
            Value::Seq(_) | Value::Map(_) | Value::Object(_) => {
                let addr = self.value.identity().unwrap_or_default();
                if self.path.borrow().contains(&addr) {
                    return f.write_str("<cycle>");
                }
                self.path.borrow_mut().push(addr);
                let result = self.aggregate(f);
                self.path.borrow_mut().pop();
                result
            }
        }
    }
}

macro_rules! impl_value_from_integer {
    ($t: ty) => {
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(From::from(v))
            }
        }
    };
}

macro_rules! impl_value_from {
    ($t: ty, $p: ident) => {
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::$p(v)
            }
        }
    };
}

impl_value_from!(bool, Bool);
impl_value_from!(Integer, Int);
impl_value_from!(f64, Float);
impl_value_from!(String, Str);
impl_value_from!(Seq, Seq);
impl_value_from!(Map, Map);
impl_value_from!(Object, Object);
impl_value_from!(Callable, Callable);
impl_value_from_integer!(u8);
impl_value_from_integer!(u16);
impl_value_from_integer!(u32);
impl_value_from_integer!(u64);
impl_value_from_integer!(usize);
impl_value_from_integer!(i8);
impl_value_from_integer!(i16);
impl_value_from_integer!(i32);
impl_value_from_integer!(i64);
impl_value_from_integer!(isize);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v.into())
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

impl<'a> From<&'a str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl<'a> From<Cow<'a, str>> for Value {
    fn from(v: Cow<'a, str>) -> Self {
        Value::Str(v.into_owned())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Seq(Seq::from_vec(v))
    }
}

impl From<Entries> for Value {
    fn from(v: Entries) -> Self {
        Value::Map(Map::from_entries(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<V: Into<Value>> std::iter::FromIterator<V> for Value {
    fn from_iter<T: IntoIterator<Item = V>>(iter: T) -> Self {
        Value::seq(iter)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn clones_share_identity() {
        let a = Value::seq(vec![1, 2]);
        let b = a.clone();
        assert!(a.same(&b));
        b.as_seq().unwrap().push(3);
        assert_eq!(a.as_seq().unwrap().len(), 3);
    }

    #[test]
    fn equal_but_distinct() {
        let a = Value::seq(Vec::<Value>::new());
        let b = Value::seq(Vec::<Value>::new());
        assert_eq!(a, b);
        assert!(!a.same(&b));
        assert!(!Value::from(1).same(&Value::from(1)));
    }

    #[test]
    fn cyclic_equality_terminates() {
        let a = Seq::new();
        a.push(a.clone());
        let b = Seq::new();
        b.push(b.clone());
        assert_eq!(Value::Seq(a.clone()), Value::Seq(b.clone()));

        let c = Seq::new();
        c.push(1);
        assert_ne!(Value::Seq(a), Value::Seq(c));
    }

    #[test]
    fn debug_marks_cycles() {
        let obj = Object::generic("Node");
        obj.set("next", obj.clone());
        obj.set("label", "head");
        let text = format!("{:?}", Value::Object(obj));
        assert_eq!(text, "Node { next: <cycle>, label: \"head\" }");
    }

    #[test]
    fn map_equality_ignores_order() {
        let a = Value::map(vec![("x", 1), ("y", 2)]);
        let b = Value::map(vec![("y", 2), ("x", 1)]);
        assert_eq!(a, b);
    }

    #[test]
    fn field_access() {
        let v = Value::object("Point", vec![("x", 3), ("y", 4)]);
        assert_eq!(v.field("x"), Value::from(3));
        assert_eq!(v.field("z"), Value::Null);
        assert_eq!(v.type_name().as_deref(), Some("Point"));
        assert_eq!(Value::from(5).at(0), Value::Null);
    }
}
