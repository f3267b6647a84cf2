use serde::{Deserialize, Serialize};

/// Immediate operand word stored alongside every instruction.
///
/// A `Value` is 64 raw bits with four views over the same storage: unsigned,
/// signed, single precision (low 32 bits) and double precision. The engine
/// never interprets the bits; which view is valid at a buffer position is
/// decided by the opcode stored there. Reading a view other than the one
/// written reinterprets the bits.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Value(u64);

impl Value {
    /// The empty immediate, used for opcodes that carry no operand.
    pub const ZERO: Value = Value(0);

    /// Unsigned word, stored as is.
    pub const fn from_u64(n: u64) -> Self {
        Value(n)
    }

    /// Signed word in two's complement.
    pub const fn from_i64(n: i64) -> Self {
        Value(n as u64)
    }

    /// Single precision bits in the low half; the high half is zero.
    pub fn from_f32(x: f32) -> Self {
        Value(x.to_bits() as u64)
    }

    /// Double precision bits.
    pub fn from_f64(x: f64) -> Self {
        Value(x.to_bits())
    }

    /// Unsigned view.
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Signed view of the same bits.
    pub const fn as_i64(self) -> i64 {
        self.0 as i64
    }

    /// Single precision view of the low 32 bits.
    pub fn as_f32(self) -> f32 {
        f32::from_bits(self.0 as u32)
    }

    /// Double precision view.
    pub fn as_f64(self) -> f64 {
        f64::from_bits(self.0)
    }

    /// Position view used by branch immediates.
    pub const fn as_position(self) -> usize {
        self.0 as usize
    }

    /// Raw storage, for listings and debugging.
    pub const fn bits(self) -> u64 {
        self.0
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::from_u64(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::from_i64(n)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::from_f32(x)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::from_f64(x)
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Value({:#018x})", self.0)
    }
}

// =============================================================================
// CARRIERS - the immediate word an instruction set is configured with
// =============================================================================

/// Fixed-size immediate word chosen by an instruction set.
///
/// A carrier stores raw bits and exposes the same four views as [`Value`].
/// Every carrier accepts every view; a carrier narrower than the view keeps
/// what fits (integers truncate, doubles round to single precision) and
/// widens on the way out. The engine only moves carriers around, so the
/// width is fixed per instruction set and never mixed within one program.
pub trait Carrier: Copy + Default + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    /// Storage width in bits.
    const WIDTH: u32;

    /// The empty immediate.
    const ZERO: Self;

    fn from_u64(n: u64) -> Self;
    fn from_i64(n: i64) -> Self;
    fn from_f32(x: f32) -> Self;
    fn from_f64(x: f64) -> Self;

    fn as_u64(self) -> u64;
    fn as_i64(self) -> i64;
    fn as_f32(self) -> f32;
    fn as_f64(self) -> f64;

    /// Encode an absolute buffer position for a branch.
    ///
    /// # Panics
    ///
    /// Panics if the position does not fit the carrier.
    fn from_position(position: usize) -> Self;

    fn as_position(self) -> usize;

    /// Raw storage, zero-extended.
    fn bits(self) -> u64;
}

impl Carrier for Value {
    const WIDTH: u32 = 64;
    const ZERO: Self = Value::ZERO;

    fn from_u64(n: u64) -> Self {
        Value::from_u64(n)
    }

    fn from_i64(n: i64) -> Self {
        Value::from_i64(n)
    }

    fn from_f32(x: f32) -> Self {
        Value::from_f32(x)
    }

    fn from_f64(x: f64) -> Self {
        Value::from_f64(x)
    }

    fn as_u64(self) -> u64 {
        Value::as_u64(self)
    }

    fn as_i64(self) -> i64 {
        Value::as_i64(self)
    }

    fn as_f32(self) -> f32 {
        Value::as_f32(self)
    }

    fn as_f64(self) -> f64 {
        Value::as_f64(self)
    }

    fn from_position(position: usize) -> Self {
        Value(position as u64)
    }

    fn as_position(self) -> usize {
        Value::as_position(self)
    }

    fn bits(self) -> u64 {
        Value::bits(self)
    }
}

/// 32-bit immediate word for integer-only instruction sets.
///
/// Unsigned and signed views share the bits; the signed view sign-extends
/// when widened. The float views share the bits of one single precision
/// number, so a double written here comes back rounded.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Value32(u32);

impl Value32 {
    pub const ZERO: Value32 = Value32(0);

    pub const fn from_u32(n: u32) -> Self {
        Value32(n)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl Carrier for Value32 {
    const WIDTH: u32 = 32;
    const ZERO: Self = Value32::ZERO;

    fn from_u64(n: u64) -> Self {
        Value32(n as u32)
    }

    fn from_i64(n: i64) -> Self {
        Value32(n as i32 as u32)
    }

    fn from_f32(x: f32) -> Self {
        Value32(x.to_bits())
    }

    fn from_f64(x: f64) -> Self {
        Value32((x as f32).to_bits())
    }

    fn as_u64(self) -> u64 {
        self.0 as u64
    }

    fn as_i64(self) -> i64 {
        self.0 as i32 as i64
    }

    fn as_f32(self) -> f32 {
        f32::from_bits(self.0)
    }

    fn as_f64(self) -> f64 {
        f32::from_bits(self.0) as f64
    }

    fn from_position(position: usize) -> Self {
        match u32::try_from(position) {
            Ok(n) => Value32(n),
            Err(_) => panic!("branch position {} does not fit a 32-bit immediate", position),
        }
    }

    fn as_position(self) -> usize {
        self.0 as usize
    }

    fn bits(self) -> u64 {
        self.0 as u64
    }
}

impl std::fmt::Debug for Value32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Value32({:#010x})", self.0)
    }
}

/// How an opcode interprets its immediate slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImmKind {
    /// No immediate; the slot holds the carrier's zero.
    None,
    /// Unsigned integer.
    Unsigned,
    /// Two's complement integer.
    Signed,
    /// Floating point, as wide as the carrier allows.
    Double,
    /// Absolute buffer position of a branch destination.
    Target,
}

impl ImmKind {
    /// Render `value` the way a listing shows this kind of immediate.
    pub fn format<C: Carrier>(self, value: C) -> Option<String> {
        match self {
            ImmKind::None => None,
            ImmKind::Unsigned => Some(value.as_u64().to_string()),
            ImmKind::Signed => Some(value.as_i64().to_string()),
            ImmKind::Double => Some(format!("{:?}", value.as_f64())),
            ImmKind::Target => Some(format!("@{:04}", value.as_position())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_default() {
        assert_eq!(Value::default(), Value::ZERO);
        assert_eq!(Value::ZERO.as_u64(), 0);
        assert_eq!(Value::ZERO.as_f64(), 0.0);
    }

    #[test]
    fn test_views_round_trip_their_own_kind() {
        assert_eq!(Value::from_u64(u64::MAX).as_u64(), u64::MAX);
        assert_eq!(Value::from_i64(-42).as_i64(), -42);
        assert_eq!(Value::from_f32(1.5).as_f32(), 1.5);
        assert_eq!(Value::from_f64(-0.25).as_f64(), -0.25);
    }

    #[test]
    fn test_signed_and_unsigned_alias() {
        let v = Value::from_i64(-1);
        assert_eq!(v.as_u64(), u64::MAX);
    }

    #[test]
    fn test_double_bits_are_preserved() {
        let v = Value::from_f64(1.0);
        assert_eq!(v.bits(), 0x3ff0_0000_0000_0000);
        assert_eq!(Value::from_u64(0x3ff0_0000_0000_0000).as_f64(), 1.0);
    }

    #[test]
    fn test_single_uses_low_half() {
        let v = Value::from_f32(1.0);
        assert_eq!(v.bits(), 0x3f80_0000);
    }

    #[test]
    fn test_from_impls() {
        assert_eq!(Value::from(7u64), Value::from_u64(7));
        assert_eq!(Value::from(-7i64), Value::from_i64(-7));
        assert_eq!(Value::from(2.5f64), Value::from_f64(2.5));
        assert_eq!(Value::from(2.5f32), Value::from_f32(2.5));
    }

    #[test]
    fn test_imm_kind_format() {
        assert_eq!(ImmKind::None.format(Value::ZERO), None);
        assert_eq!(
            ImmKind::Signed.format(Value::from_i64(-5)).as_deref(),
            Some("-5")
        );
        assert_eq!(
            ImmKind::Double.format(Value::from_f64(1.0)).as_deref(),
            Some("1.0")
        );
        assert_eq!(
            ImmKind::Target.format(Value::from_u64(3)).as_deref(),
            Some("@0003")
        );
    }

    #[test]
    fn test_narrow_carrier_truncates_integers() {
        assert_eq!(Value32::WIDTH, 32);
        assert_eq!(Value32::from_u64(0x1_0000_0005).as_u64(), 5);
        assert_eq!(Value32::from_i64(-1).as_i64(), -1);
        assert_eq!(Value32::from_i64(-1).as_u64(), u32::MAX as u64);
        assert_eq!(<Value32 as Carrier>::ZERO, Value32::default());
    }

    #[test]
    fn test_narrow_carrier_rounds_doubles() {
        let v = Value32::from_f64(0.1);
        assert_eq!(v.as_f32(), 0.1f32);
        assert_eq!(v.as_f64(), 0.1f32 as f64);
        assert_eq!(Value32::from_f64(0.5).as_f64(), 0.5);
    }

    #[test]
    fn test_carriers_encode_positions() {
        assert_eq!(<Value as Carrier>::from_position(9).as_position(), 9);
        assert_eq!(Value32::from_position(9).as_position(), 9);
        assert_eq!(Value32::from_position(9).bits(), 9);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    #[should_panic(expected = "does not fit a 32-bit immediate")]
    fn test_narrow_carrier_rejects_far_positions() {
        Value32::from_position(1 << 40);
    }

    #[test]
    fn test_format_is_carrier_generic() {
        assert_eq!(
            ImmKind::Signed.format(Value32::from_i64(-3)).as_deref(),
            Some("-3")
        );
        assert_eq!(
            ImmKind::Target.format(Value32::from_position(12)).as_deref(),
            Some("@0012")
        );
    }

    #[test]
    fn test_debug_shows_raw_bits() {
        assert_eq!(
            format!("{:?}", Value::from_u64(255)),
            "Value(0x00000000000000ff)"
        );
            assert_eq!(format!("{:?}", Value32::from_u32(255)), "Value32(0x000000ff)");
    }
}
