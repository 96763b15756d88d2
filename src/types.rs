use std::fmt;


/// Operator codes, ordered by arity: all unary operators come before all
/// binary ones, and `arity` relies on that ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperatorCode {
    UnaryPlus = 0,
    UnaryMinus = 1,

    Add = 3,
    Sub = 4,
    Mul = 5,
    Div = 6,
    Assign = 7,
    Mod = 8,
}

const UNARY_MAX: u8 = 2;
const BINARY_MAX: u8 = 9;

impl OperatorCode {
    pub fn arity(self) -> usize {
        let code = self as u8;
        if code < UNARY_MAX {
            1
        } else if code > UNARY_MAX && code < BINARY_MAX {
            2
        } else {
            0
        }
    }

    pub fn symbol(self) -> &'static str {
        use OperatorCode::*;
        match self {
            UnaryPlus => "u+",
            UnaryMinus => "u-",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Assign => "=",
            Mod => "%",
        }
    }
}

impl fmt::Display for OperatorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeTag { I8, I16, I32, I64, U8, U16, U32, U64 }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signedness { Signed, Unsigned }

#[derive(Debug)]
pub enum OpSupport {
    All,
    Only(&'static [OperatorCode]),
}

impl OpSupport {
    fn contains(&self, code: OperatorCode) -> bool {
        match self {
            OpSupport::All => true,
            OpSupport::Only(codes) => codes.contains(&code),
        }
    }
}

/// A built-in type. Types are compared by registry identity (their tag),
/// never structurally.
#[derive(Debug)]
pub struct Type {
    pub name: &'static str,
    pub tag: TypeTag,
    pub size: u8,
    pub align: u8,
    pub signedness: Signedness,
    pub unary_ops: OpSupport,
    pub binary_ops: OpSupport,
    /// Tags this type may be implicitly widened to, excluding itself.
    pub widens_to: &'static [TypeTag],
}

impl PartialEq for Type {
    fn eq(&self, other: &Type) -> bool { self.tag == other.tag }
}

impl Eq for Type {}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl Type {
    pub fn is_signed(&self) -> bool { self.signedness == Signedness::Signed }

    pub fn max_value(&self) -> u64 {
        let bits = u32::from(self.size) * 8;
        match self.signedness {
            Signedness::Signed => (1u64 << (bits - 1)) - 1,
            Signedness::Unsigned if bits == 64 => u64::MAX,
            Signedness::Unsigned => (1u64 << bits) - 1,
        }
    }

    pub fn fits(&self, value: u64) -> bool { value <= self.max_value() }

    /// Whether `-magnitude` is representable. Signed types reach one
    /// further below zero than above it.
    pub fn fits_negated(&self, magnitude: u64) -> bool {
        match self.signedness {
            Signedness::Signed => magnitude <= self.max_value() + 1,
            Signedness::Unsigned => self.fits(magnitude),
        }
    }
}

const UNSIGNED_UNARY_OPS: &[OperatorCode] = &[OperatorCode::UnaryPlus];

macro_rules! builtin {
    ($name:expr, $tag:ident, $size:expr, signed, $widens:expr) => {
        Type {
            name: $name,
            tag: TypeTag::$tag,
            size: $size,
            align: $size,
            signedness: Signedness::Signed,
            unary_ops: OpSupport::All,
            binary_ops: OpSupport::All,
            widens_to: $widens,
        }
    };
    ($name:expr, $tag:ident, $size:expr, unsigned, $widens:expr) => {
        Type {
            name: $name,
            tag: TypeTag::$tag,
            size: $size,
            align: $size,
            signedness: Signedness::Unsigned,
            unary_ops: OpSupport::Only(UNSIGNED_UNARY_OPS),
            binary_ops: OpSupport::All,
            widens_to: $widens,
        }
    };
}

pub static I8: Type = builtin!("i8", I8, 1, signed, &[TypeTag::I16, TypeTag::I32, TypeTag::I64]);
pub static I16: Type = builtin!("i16", I16, 2, signed, &[TypeTag::I32, TypeTag::I64]);
pub static I32: Type = builtin!("i32", I32, 4, signed, &[TypeTag::I64]);
pub static I64: Type = builtin!("i64", I64, 8, signed, &[]);
pub static U8: Type = builtin!("u8", U8, 1, unsigned, &[TypeTag::U16, TypeTag::U32, TypeTag::U64]);
pub static U16: Type = builtin!("u16", U16, 2, unsigned, &[TypeTag::U32, TypeTag::U64]);
pub static U32: Type = builtin!("u32", U32, 4, unsigned, &[TypeTag::U64]);
pub static U64: Type = builtin!("u64", U64, 8, unsigned, &[]);

pub static BUILTIN_TYPES: [&Type; 8] = [&I8, &I16, &I32, &I64, &U8, &U16, &U32, &U64];

/// Type of an integer literal written without a suffix.
pub fn default_int() -> &'static Type { &I32 }

pub fn builtin(name: &str) -> Option<&'static Type> {
    BUILTIN_TYPES.iter().copied().find(|ty| ty.name == name)
}

pub fn by_tag(tag: TypeTag) -> &'static Type {
    match tag {
        TypeTag::I8 => &I8,
        TypeTag::I16 => &I16,
        TypeTag::I32 => &I32,
        TypeTag::I64 => &I64,
        TypeTag::U8 => &U8,
        TypeTag::U16 => &U16,
        TypeTag::U32 => &U32,
        TypeTag::U64 => &U64,
    }
}

pub fn type_supports_op(ty: &Type, code: OperatorCode) -> bool {
    match code.arity() {
        1 => ty.unary_ops.contains(code),
        2 => ty.binary_ops.contains(code),
        _ => false,
    }
}

/// True when `from` widens implicitly to `to`. One-directional: callers
/// wanting symmetric compatibility must ask both ways.
pub fn types_compatible(from: &Type, to: &Type) -> bool {
    from.widens_to.contains(&to.tag)
}
