//! # Frame Codec
//!
//! Encoding and decoding of Modbus TCP ADUs for the two function codes the
//! telemetry controller supports.
//!
//! ## Frame Layout
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 2 | Transaction ID |
//! | 2 | 2 | Protocol ID (always 0) |
//! | 4 | 2 | Length (unit id + PDU) |
//! | 6 | 1 | Unit ID |
//! | 7 | 1 | Function code |
//! | 8 | .. | Function-specific data |
//!
//! All fields are big-endian. Every function here is pure: no I/O, no shared state.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::constants::{
    EXCEPTION_FLAG, FC_READ_HOLDING_REGISTERS, FC_WRITE_SINGLE_REGISTER, MBAP_HEADER_LEN,
    MAX_READ_REGISTERS, MODBUS_PROTOCOL_ID, READ_RESPONSE_MIN_LEN, REQUEST_ADU_LEN, REQUEST_LENGTH_FIELD,
    UNIT_ID_BROADCAST, WRITE_RESPONSE_LEN,
};
use crate::error::DecodeError;

/// Function codes understood by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCode {
    /// FC03
    ReadHoldingRegisters,
    /// FC06
    WriteSingleRegister,
}

impl FunctionCode {
    #[inline]
    pub fn to_u8(self) -> u8 {
        match self {
            Self::ReadHoldingRegisters => FC_READ_HOLDING_REGISTERS,
            Self::WriteSingleRegister => FC_WRITE_SINGLE_REGISTER,
        }
    }

    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            FC_READ_HOLDING_REGISTERS => Some(Self::ReadHoldingRegisters),
            FC_WRITE_SINGLE_REGISTER => Some(Self::WriteSingleRegister),
            _ => None,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::ReadHoldingRegisters => "Read Holding Registers",
            Self::WriteSingleRegister => "Write Single Register",
        }
    }
}

/// Modbus Application Protocol header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    pub transaction_id: u16,
    pub protocol_id: u16,
    pub length: u16,
    pub unit_id: u8,
}

impl MbapHeader {
    /// Header for a 12-byte FC03/FC06 request
    pub fn request(transaction_id: u16) -> Self {
        Self {
            transaction_id,
            protocol_id: MODBUS_PROTOCOL_ID,
            length: REQUEST_LENGTH_FIELD,
            unit_id: UNIT_ID_BROADCAST,
        }
    }

    /// Parse the header from the start of a frame
    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < MBAP_HEADER_LEN {
            return None;
        }
        let mut buf = &frame[..MBAP_HEADER_LEN];
        Some(Self {
            transaction_id: buf.get_u16(),
            protocol_id: buf.get_u16(),
            length: buf.get_u16(),
            unit_id: buf.get_u8(),
        })
    }

    fn put(&self, buf: &mut BytesMut) {
        buf.put_u16(self.transaction_id);
        buf.put_u16(self.protocol_id);
        buf.put_u16(self.length);
        buf.put_u8(self.unit_id);
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Encode a Read Holding Registers (FC03) request.
///
/// `count` must be within 1..=125; the codec does not re-check it.
///
/// # Example
///
/// ```rust
/// use drone_modbus::codec::encode_read_request;
///
/// let frame = encode_read_request(0, 10, 1);
/// assert_eq!(
///     &frame[..],
///     &[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0xFF, 0x03, 0x00, 0x00, 0x00, 0x0A]
/// );
/// ```
pub fn encode_read_request(start_addr: u16, count: u16, transaction_id: u16) -> Bytes {
    encode_request(
        FunctionCode::ReadHoldingRegisters,
        start_addr,
        count,
        transaction_id,
    )
}

/// Encode a Write Single Register (FC06) request. Always 12 bytes.
pub fn encode_write_request(address: u16, value: u16, transaction_id: u16) -> Bytes {
    encode_request(
        FunctionCode::WriteSingleRegister,
        address,
        value,
        transaction_id,
    )
}

fn encode_request(function: FunctionCode, first: u16, second: u16, transaction_id: u16) -> Bytes {
    let mut buf = BytesMut::with_capacity(REQUEST_ADU_LEN);
    MbapHeader::request(transaction_id).put(&mut buf);
    buf.put_u8(function.to_u8());
    buf.put_u16(first);
    buf.put_u16(second);

    debug!(
        "ADU built: tid={} FC={:02X} ({}) bytes={:02X?}",
        transaction_id,
        function.to_u8(),
        function.description(),
        &buf[..]
    );

    buf.freeze()
}

/// Encode a FC03 response the way a server would. Used by simulators and tests.
///
/// At most 125 values fit the one-byte byte count; extra values are dropped.
pub fn encode_read_response(transaction_id: u16, unit_id: u8, values: &[u16]) -> Bytes {
    let values = &values[..values.len().min(MAX_READ_REGISTERS as usize)];
    let byte_count = values.len() * 2;
    let mut buf = BytesMut::with_capacity(READ_RESPONSE_MIN_LEN + byte_count);
    MbapHeader {
        transaction_id,
        protocol_id: MODBUS_PROTOCOL_ID,
        length: (3 + byte_count) as u16,
        unit_id,
    }
    .put(&mut buf);
    buf.put_u8(FC_READ_HOLDING_REGISTERS);
    buf.put_u8(byte_count as u8);
    for &value in values {
        buf.put_u16(value);
    }
    buf.freeze()
}

/// Encode an exception response for `function` with the given exception code.
pub fn encode_exception_response(
    transaction_id: u16,
    unit_id: u8,
    function: FunctionCode,
    code: u8,
) -> Bytes {
    let mut buf = BytesMut::with_capacity(READ_RESPONSE_MIN_LEN);
    MbapHeader {
        transaction_id,
        protocol_id: MODBUS_PROTOCOL_ID,
        length: 3,
        unit_id,
    }
    .put(&mut buf);
    buf.put_u8(function.to_u8() | EXCEPTION_FLAG);
    buf.put_u8(code);
    buf.freeze()
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode a FC03 response into `expected_count` register values.
///
/// Checks run in a fixed order and the first failure wins:
/// 1. at least 9 bytes (header, function code, byte count)
/// 2. transaction id matches the request
/// 3. exception flag on the function code
/// 4. byte count equals `expected_count * 2`
/// 5. the register payload is physically present
pub fn decode_read_response(
    frame: &[u8],
    expected_transaction_id: u16,
    expected_count: u16,
) -> Result<Vec<u16>, DecodeError> {
    if frame.len() < READ_RESPONSE_MIN_LEN {
        return Err(DecodeError::InvalidLength {
            actual: frame.len(),
            minimum: READ_RESPONSE_MIN_LEN,
        });
    }

    check_transaction_id(frame, expected_transaction_id)?;
    check_exception(frame)?;

    let byte_count = frame[8];
    let expected_bytes = expected_count as usize * 2;
    if byte_count as usize != expected_bytes {
        return Err(DecodeError::ByteCountMismatch {
            expected: expected_bytes,
            actual: byte_count,
        });
    }

    let end = READ_RESPONSE_MIN_LEN + expected_bytes;
    if frame.len() < end {
        return Err(DecodeError::InvalidLength {
            actual: frame.len(),
            minimum: end,
        });
    }

    let mut payload = &frame[READ_RESPONSE_MIN_LEN..end];
    let registers: Vec<u16> = (0..expected_count).map(|_| payload.get_u16()).collect();

    debug!(
        "FC03 response decoded: tid={} registers={:?}",
        expected_transaction_id, registers
    );

    Ok(registers)
}

/// Accept a FC06 response on length alone (at least 12 bytes).
///
/// This is the lenient acknowledgment check; [`decode_write_ack`] also
/// verifies the transaction id and the echoed fields.
pub fn decode_write_response(frame: &[u8]) -> Result<(), DecodeError> {
    if frame.len() < WRITE_RESPONSE_LEN {
        return Err(DecodeError::InvalidLength {
            actual: frame.len(),
            minimum: WRITE_RESPONSE_LEN,
        });
    }
    Ok(())
}

/// Validate a FC06 acknowledgment against the request that produced it.
pub fn decode_write_ack(
    frame: &[u8],
    expected_transaction_id: u16,
    address: u16,
    value: u16,
) -> Result<(), DecodeError> {
    if frame.len() < READ_RESPONSE_MIN_LEN {
        return Err(DecodeError::InvalidLength {
            actual: frame.len(),
            minimum: READ_RESPONSE_MIN_LEN,
        });
    }

    check_transaction_id(frame, expected_transaction_id)?;
    check_exception(frame)?;
    decode_write_response(frame)?;

    let mut pdu = &frame[MBAP_HEADER_LEN..WRITE_RESPONSE_LEN];
    let function = pdu.get_u8();
    let echoed_address = pdu.get_u16();
    let echoed_value = pdu.get_u16();

    if function != FC_WRITE_SINGLE_REGISTER || echoed_address != address || echoed_value != value
    {
        return Err(DecodeError::EchoMismatch {
            expected_function: FC_WRITE_SINGLE_REGISTER,
            expected_address: address,
            expected_value: value,
            function,
            address: echoed_address,
            value: echoed_value,
        });
    }

    Ok(())
}

fn check_transaction_id(frame: &[u8], expected: u16) -> Result<(), DecodeError> {
    let actual = u16::from_be_bytes([frame[0], frame[1]]);
    if actual != expected {
        return Err(DecodeError::TransactionMismatch { expected, actual });
    }
    Ok(())
}

fn check_exception(frame: &[u8]) -> Result<(), DecodeError> {
    let function = frame[MBAP_HEADER_LEN];
    if function & EXCEPTION_FLAG != 0 {
        let code = frame[MBAP_HEADER_LEN + 1];
        debug!(
            "Exception response: FC={:02X}, exception_code={:02X}",
            function, code
        );
        return Err(DecodeError::ProtocolException { function, code });
    }
    Ok(())
}
