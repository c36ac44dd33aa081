//! Modbus TCP constants used by the polling client
//!
//! Only the two function codes the telemetry controller speaks are defined here.
//! Frame sizes follow the Modbus Application Protocol over TCP:
//! - MBAP header: 7 bytes
//! - Maximum PDU size: 253 bytes

use std::time::Duration;

// ============================================================================
// Frame Size Constants
// ============================================================================

/// Modbus MBAP header length for TCP
/// Format: Transaction ID(2) + Protocol ID(2) + Length(2) + Unit ID(1) = 7 bytes
pub const MBAP_HEADER_LEN: usize = 7;

/// Protocol identifier carried in every MBAP header (0 = Modbus)
pub const MODBUS_PROTOCOL_ID: u16 = 0x0000;

/// Unit identifier placed in every request (0xFF = broadcast)
pub const UNIT_ID_BROADCAST: u8 = 0xFF;

/// MBAP length field for both request shapes: Unit ID(1) + FC(1) + 2 × u16
pub const REQUEST_LENGTH_FIELD: u16 = 6;

/// Total size of a FC03/FC06 request ADU
pub const REQUEST_ADU_LEN: usize = MBAP_HEADER_LEN + 5;

/// Minimum FC03 response: MBAP header + function code + byte count
pub const READ_RESPONSE_MIN_LEN: usize = MBAP_HEADER_LEN + 2;

/// FC06 responses echo the request, so they share its size
pub const WRITE_RESPONSE_LEN: usize = REQUEST_ADU_LEN;

/// Maximum PDU (Protocol Data Unit) size per Modbus specification
pub const MAX_PDU_SIZE: usize = 253;

/// Receive buffer for a single response frame
///
/// Largest FC03 response is 7 + 1 + 1 + 250 = 259 bytes.
pub const RESPONSE_BUFFER_SIZE: usize = 260;

// ============================================================================
// Register Operation Limits
// ============================================================================

/// Maximum number of registers for FC03 (Read Holding Registers)
///
/// Response PDU: FC(1) + Byte Count(1) + N × 2 ≤ 253, therefore N ≤ 125.
pub const MAX_READ_REGISTERS: u16 = 125;

// ============================================================================
// Modbus Function Codes
// ============================================================================

/// Read Holding Registers (FC03)
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Write Single Register (FC06)
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;

/// High bit set on the function code of an exception response
pub const EXCEPTION_FLAG: u8 = 0x80;

// ============================================================================
// Modbus Exception Codes
// ============================================================================

/// Illegal Function
pub const EXCEPTION_ILLEGAL_FUNCTION: u8 = 0x01;

/// Illegal Data Address
pub const EXCEPTION_ILLEGAL_DATA_ADDRESS: u8 = 0x02;

/// Illegal Data Value
pub const EXCEPTION_ILLEGAL_DATA_VALUE: u8 = 0x03;

/// Server Device Failure
pub const EXCEPTION_SERVER_DEVICE_FAILURE: u8 = 0x04;

/// Acknowledge
pub const EXCEPTION_ACKNOWLEDGE: u8 = 0x05;

/// Server Device Busy
pub const EXCEPTION_SERVER_DEVICE_BUSY: u8 = 0x06;

/// Memory Parity Error
pub const EXCEPTION_MEMORY_PARITY_ERROR: u8 = 0x08;

/// Gateway Path Unavailable
pub const EXCEPTION_GATEWAY_PATH_UNAVAILABLE: u8 = 0x0A;

/// Gateway Target Device Failed to Respond
pub const EXCEPTION_GATEWAY_TARGET_FAILED: u8 = 0x0B;

/// Human-readable name of a Modbus exception code
pub fn exception_description(code: u8) -> &'static str {
    match code {
        EXCEPTION_ILLEGAL_FUNCTION => "Illegal Function",
        EXCEPTION_ILLEGAL_DATA_ADDRESS => "Illegal Data Address",
        EXCEPTION_ILLEGAL_DATA_VALUE => "Illegal Data Value",
        EXCEPTION_SERVER_DEVICE_FAILURE => "Server Device Failure",
        EXCEPTION_ACKNOWLEDGE => "Acknowledge",
        EXCEPTION_SERVER_DEVICE_BUSY => "Server Device Busy",
        EXCEPTION_MEMORY_PARITY_ERROR => "Memory Parity Error",
        EXCEPTION_GATEWAY_PATH_UNAVAILABLE => "Gateway Path Unavailable",
        EXCEPTION_GATEWAY_TARGET_FAILED => "Gateway Target Failed to Respond",
        _ => "Unknown Exception",
    }
}

// ============================================================================
// Telemetry Block & Client Defaults
// ============================================================================

/// First holding register of the telemetry block
pub const TELEMETRY_START_ADDRESS: u16 = 0;

/// Number of holding registers in the telemetry block
pub const TELEMETRY_REGISTER_COUNT: u16 = 10;

/// Default controller host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default controller port
pub const DEFAULT_PORT: u16 = 8888;

/// Socket send/receive timeout
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause between polling cycles
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Pause before the single reconnect attempt
pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(2);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size_constants() {
        assert_eq!(MBAP_HEADER_LEN, 7);
        assert_eq!(REQUEST_ADU_LEN, 12);
        assert_eq!(READ_RESPONSE_MIN_LEN, 9);
        assert_eq!(WRITE_RESPONSE_LEN, 12);
    }

    #[test]
    fn test_register_limits() {
        let read_pdu_size = 1 + 1 + (MAX_READ_REGISTERS as usize * 2);
        assert!(read_pdu_size <= MAX_PDU_SIZE);
        assert!(MBAP_HEADER_LEN + read_pdu_size <= RESPONSE_BUFFER_SIZE);
    }

    #[test]
    fn test_exception_descriptions() {
        assert_eq!(exception_description(0x02), "Illegal Data Address");
        assert_eq!(exception_description(0x7F), "Unknown Exception");
    }
}
