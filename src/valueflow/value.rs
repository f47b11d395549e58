//! The value-flow fact attached to expression tokens.

use crate::tokens::TokenId;

/// Ordered trail of `(token, explanation)` steps showing how a fact was
/// derived; reported alongside the diagnostic.
pub type ErrorPath = Vec<(TokenId, String)>;

/// What kind of payload a value carries. The discriminants are persisted
/// in the analyzer-info file, so the order is part of the format.
#[derive(Clone, Debug, PartialEq)]
pub enum ValuePayload {
    Int(i64),
    /// The token that *is* the value (string literal, pointer alias).
    Tok(TokenId),
    Float(f64),
    Moved(MoveKind),
    Uninit,
    ContainerSize(i64),
    Lifetime {
        token: TokenId,
        kind: LifetimeKind,
        scope: LifetimeScope,
    },
    BufferSize(i64),
}

impl ValuePayload {
    /// Stable tag used in the analyzer-info serialization.
    pub fn tag(&self) -> u8 {
        match self {
            ValuePayload::Int(_) => 0,
            ValuePayload::Tok(_) => 1,
            ValuePayload::Float(_) => 2,
            ValuePayload::Moved(_) => 3,
            ValuePayload::Uninit => 4,
            ValuePayload::ContainerSize(_) => 5,
            ValuePayload::Lifetime { .. } => 6,
            ValuePayload::BufferSize(_) => 7,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveKind {
    NonMovedVariable,
    MovedVariable,
    ForwardedVariable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifetimeKind {
    Object,
    SubObject,
    Lambda,
    Iterator,
    Address,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifetimeScope {
    Local,
    Argument,
}

/// Interval bound carried by a value: `Point` is exact, `Lower` at-least,
/// `Upper` at-most.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bound {
    Upper,
    Lower,
    Point,
}

/// How known a value is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    /// This value is possible; unlisted values may also occur.
    Possible,
    /// Only listed values occur.
    Known,
    /// Evidence is weak; report only with inconclusive certainty enabled.
    Inconclusive,
    /// Listed values cannot occur.
    Impossible,
}

/// A value-flow fact.
#[derive(Clone, Debug)]
pub struct Value {
    pub payload: ValuePayload,
    pub bound: Bound,
    pub kind: ValueKind,
    /// Condition token this value depends on, when condition-derived.
    pub condition: Option<TokenId>,
    /// Variable id a calculated value depends on; 0 for none.
    pub var_id: u32,
    /// Value of that variable the calculation assumed.
    pub var_value: i64,
    pub error_path: ErrorPath,
    /// Value comes from a default argument.
    pub default_arg: bool,
    /// Value relies on safe checking.
    pub safe: bool,
    /// Value is conditional.
    pub conditional: bool,
    /// Indirection level the fact applies to.
    pub indirect: i32,
    /// Path id for path-sensitive values; 0 applies to all paths.
    pub path: i64,
}

impl Value {
    pub fn new(payload: ValuePayload) -> Value {
        Value {
            payload,
            bound: Bound::Point,
            kind: ValueKind::Possible,
            condition: None,
            var_id: 0,
            var_value: 0,
            error_path: Vec::new(),
            default_arg: false,
            safe: false,
            conditional: false,
            indirect: 0,
            path: 0,
        }
    }

    pub fn int(v: i64) -> Value {
        Value::new(ValuePayload::Int(v))
    }

    pub fn known_int(v: i64) -> Value {
        let mut value = Value::int(v);
        value.kind = ValueKind::Known;
        value
    }

    pub fn uninit() -> Value {
        Value::new(ValuePayload::Uninit)
    }

    pub fn buffer_size(bytes: i64) -> Value {
        Value::new(ValuePayload::BufferSize(bytes))
    }

    pub fn with_kind(mut self, kind: ValueKind) -> Value {
        self.kind = kind;
        self
    }

    pub fn with_error_path(mut self, path: ErrorPath) -> Value {
        self.error_path = path;
        self
    }

    pub fn is_int(&self) -> bool {
        matches!(self.payload, ValuePayload::Int(_))
    }

    pub fn is_tok(&self) -> bool {
        matches!(self.payload, ValuePayload::Tok(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self.payload, ValuePayload::Float(_))
    }

    pub fn is_moved(&self) -> bool {
        matches!(self.payload, ValuePayload::Moved(_))
    }

    pub fn is_uninit(&self) -> bool {
        matches!(self.payload, ValuePayload::Uninit)
    }

    pub fn is_container_size(&self) -> bool {
        matches!(self.payload, ValuePayload::ContainerSize(_))
    }

    pub fn is_lifetime(&self) -> bool {
        matches!(self.payload, ValuePayload::Lifetime { .. })
    }

    pub fn is_buffer_size(&self) -> bool {
        matches!(self.payload, ValuePayload::BufferSize(_))
    }

    pub fn is_local_lifetime(&self) -> bool {
        matches!(
            self.payload,
            ValuePayload::Lifetime {
                scope: LifetimeScope::Local,
                ..
            }
        )
    }

    /// Integer payload of an `Int` value.
    pub fn int_payload(&self) -> Option<i64> {
        match self.payload {
            ValuePayload::Int(v) => Some(v),
            _ => None,
        }
    }

    /// Numeric payload for serialization: int, container or buffer size.
    pub fn numeric_payload(&self) -> i64 {
        match self.payload {
            ValuePayload::Int(v) | ValuePayload::ContainerSize(v) | ValuePayload::BufferSize(v) => {
                v
            }
            _ => 0,
        }
    }

    pub fn is_known(&self) -> bool {
        self.kind == ValueKind::Known
    }

    pub fn is_possible(&self) -> bool {
        self.kind == ValueKind::Possible
    }

    pub fn is_impossible(&self) -> bool {
        self.kind == ValueKind::Impossible
    }

    pub fn is_inconclusive(&self) -> bool {
        self.kind == ValueKind::Inconclusive
    }

    pub fn set_known(&mut self) {
        self.kind = ValueKind::Known;
    }

    pub fn set_impossible(&mut self) {
        self.kind = ValueKind::Impossible;
    }

    pub fn change_known_to_possible(&mut self) {
        if self.is_known() {
            self.kind = ValueKind::Possible;
        }
    }

    /// Payload-only equality: provenance is ignored.
    pub fn equal_value(&self, other: &Value) -> bool {
        match (&self.payload, &other.payload) {
            (ValuePayload::Int(a), ValuePayload::Int(b)) => a == b,
            (ValuePayload::Tok(a), ValuePayload::Tok(b)) => a == b,
            (ValuePayload::Float(a), ValuePayload::Float(b)) => !(a > b || a < b),
            (ValuePayload::Moved(a), ValuePayload::Moved(b)) => a == b,
            (ValuePayload::Uninit, ValuePayload::Uninit) => true,
            (ValuePayload::ContainerSize(a), ValuePayload::ContainerSize(b)) => a == b,
            (ValuePayload::Lifetime { token: a, .. }, ValuePayload::Lifetime { token: b, .. }) => {
                a == b
            }
            (ValuePayload::BufferSize(a), ValuePayload::BufferSize(b)) => a == b,
            _ => false,
        }
    }

    /// Shrink the interval toward the point: a lower bound rises, an upper
    /// bound falls.
    pub fn decrease_range(&mut self) {
        let delta = match self.bound {
            Bound::Lower => 1,
            Bound::Upper => -1,
            Bound::Point => 0,
        };
        if delta != 0 {
            self.visit_numeric(|v| *v += delta);
        }
    }

    pub fn invert_bound(&mut self) {
        self.bound = match self.bound {
            Bound::Lower => Bound::Upper,
            Bound::Upper => Bound::Lower,
            Bound::Point => Bound::Point,
        };
    }

    /// Negate a bound condition: flip the bound, then shrink by one.
    pub fn invert_range(&mut self) {
        self.invert_bound();
        self.decrease_range();
    }

    fn visit_numeric(&mut self, f: impl FnOnce(&mut i64)) {
        match &mut self.payload {
            ValuePayload::Int(v) | ValuePayload::ContainerSize(v) | ValuePayload::BufferSize(v) => {
                f(v)
            }
            _ => {}
        }
    }

    /// True when the fact is unconditional, i.e. reportable as an error
    /// rather than a warning.
    pub fn error_severity(&self) -> bool {
        self.condition.is_none() && !self.default_arg
    }

    /// Human-readable payload for error paths.
    pub fn info_string(&self) -> String {
        match &self.payload {
            ValuePayload::Int(v) => v.to_string(),
            ValuePayload::Tok(_) => "token".to_string(),
            ValuePayload::Float(v) => v.to_string(),
            ValuePayload::Moved(_) => "moved".to_string(),
            ValuePayload::Uninit => "uninitialized".to_string(),
            ValuePayload::ContainerSize(v) => format!("size={v}"),
            ValuePayload::Lifetime { .. } => "lifetime".to_string(),
            ValuePayload::BufferSize(v) => format!("buffer-size={v}"),
        }
    }
}

impl PartialEq for Value {
    /// Payload plus provenance, mirroring the distinction from
    /// [`Value::equal_value`].
    fn eq(&self, other: &Value) -> bool {
        self.equal_value(other)
            && self.var_value == other.var_value
            && self.condition == other.condition
            && self.var_id == other.var_id
            && self.conditional == other.conditional
            && self.default_arg == other.default_arg
            && self.indirect == other.indirect
            && self.kind == other.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_value_ignores_provenance() {
        let mut a = Value::known_int(42);
        let mut b = Value::int(42);
        b.condition = Some(TokenId(7));
        assert!(a.equal_value(&b));
        assert!(a != b);
        a.kind = ValueKind::Possible;
        a.condition = Some(TokenId(7));
        assert!(a == b);
    }

    #[test]
    fn bound_algebra() {
        let mut v = Value::int(5);
        v.bound = Bound::Upper;
        v.decrease_range();
        assert_eq!(v.int_payload(), Some(4));

        let mut w = Value::int(5);
        w.bound = Bound::Lower;
        w.decrease_range();
        assert_eq!(w.int_payload(), Some(6));

        // Negating `x >= 5` gives `x <= 4`.
        let mut n = Value::int(5);
        n.bound = Bound::Lower;
        n.invert_range();
        assert_eq!(n.bound, Bound::Upper);
        assert_eq!(n.int_payload(), Some(4));

        // Point values are unaffected.
        let mut p = Value::int(5);
        p.decrease_range();
        assert_eq!(p.int_payload(), Some(5));
    }

    #[test]
    fn error_severity_requires_no_condition() {
        let mut v = Value::known_int(0);
        assert!(v.error_severity());
        v.condition = Some(TokenId(1));
        assert!(!v.error_severity());
        let mut w = Value::known_int(0);
        w.default_arg = true;
        assert!(!w.error_severity());
    }

    #[test]
    fn payload_tags_are_stable() {
        assert_eq!(Value::int(1).payload.tag(), 0);
        assert_eq!(Value::uninit().payload.tag(), 4);
        assert_eq!(Value::buffer_size(8).payload.tag(), 7);
    }

    #[test]
    fn known_to_possible_downgrade() {
        let mut v = Value::known_int(3);
        v.change_known_to_possible();
        assert!(v.is_possible());
        v.set_impossible();
        v.change_known_to_possible();
        assert!(v.is_impossible());
    }
}
