//! Identifier flag bits and masks of the wire identifier field.
//!
//! Values match `<linux/can.h>`; they are duplicated here so the codec does
//! not depend on the host platform.

/// Extended frame format (29-bit identifier).
pub const CAN_EFF_FLAG: u32 = 0x8000_0000;

/// Remote transmission request.
pub const CAN_RTR_FLAG: u32 = 0x4000_0000;

/// Error message frame.
pub const CAN_ERR_FLAG: u32 = 0x2000_0000;

/// Standard frame format identifier mask (11 bits).
pub const CAN_SFF_MASK: u32 = 0x0000_07FF;

/// Extended frame format identifier mask (29 bits).
pub const CAN_EFF_MASK: u32 = 0x1FFF_FFFF;

/// Identifier mask for the given format.
pub fn id_mask(extended: bool) -> u32 {
    if extended {
        CAN_EFF_MASK
    } else {
        CAN_SFF_MASK
    }
}

/// Returns true if `id` fits the standard or extended identifier range.
pub fn is_valid_id(id: u32, extended: bool) -> bool {
    id & !id_mask(extended) == 0
}
