//! Transaction Manager
//!
//! Assigns transaction ids and performs exactly one
//! encode → send → receive → decode round trip per call. Nothing here retries;
//! failures go back to the caller untouched.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::codec::{
    decode_read_response, decode_write_ack, encode_read_request, encode_write_request,
    FunctionCode,
};
use crate::constants::{MAX_READ_REGISTERS, RESPONSE_BUFFER_SIZE};
use crate::error::{DecodeError, ModbusError, ModbusResult};
use crate::transport::ModbusTransport;

/// First transaction id handed out after process start
pub const INITIAL_TRANSACTION_ID: u16 = 1;

/// Operation carried by a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// FC03; `count` also fixes the byte count the answer must carry
    ReadHoldingRegisters { start_addr: u16, count: u16 },
    /// FC06; the answer must echo `address` and `value`
    WriteSingleRegister { address: u16, value: u16 },
}

/// A request awaiting its response. Lives for one round trip only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    pub id: u16,
    pub request: Request,
}

impl Transaction {
    pub fn function(&self) -> FunctionCode {
        match self.request {
            Request::ReadHoldingRegisters { .. } => FunctionCode::ReadHoldingRegisters,
            Request::WriteSingleRegister { .. } => FunctionCode::WriteSingleRegister,
        }
    }

    /// Register count for reads
    pub fn expected_count(&self) -> Option<u16> {
        match self.request {
            Request::ReadHoldingRegisters { count, .. } => Some(count),
            Request::WriteSingleRegister { .. } => None,
        }
    }

    /// Request ADU carrying this transaction's id
    pub fn encode(&self) -> Bytes {
        match self.request {
            Request::ReadHoldingRegisters { start_addr, count } => {
                encode_read_request(start_addr, count, self.id)
            }
            Request::WriteSingleRegister { address, value } => {
                encode_write_request(address, value, self.id)
            }
        }
    }

    /// Validate `frame` as the answer to this transaction.
    ///
    /// Reads yield the register values, writes an empty vector.
    pub fn resolve(&self, frame: &[u8]) -> Result<Vec<u16>, DecodeError> {
        match self.request {
            Request::ReadHoldingRegisters { count, .. } => {
                decode_read_response(frame, self.id, count)
            }
            Request::WriteSingleRegister { address, value } => {
                decode_write_ack(frame, self.id, address, value).map(|()| Vec::new())
            }
        }
    }
}

/// Owner of the transaction id counter
#[derive(Debug)]
pub struct TransactionManager {
    next_id: u16,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    pub fn new() -> Self {
        Self {
            next_id: INITIAL_TRANSACTION_ID,
        }
    }

    /// Id the next request will carry
    pub fn peek_next_id(&self) -> u16 {
        self.next_id
    }

    /// Take the next id, wrapping modulo 65536
    pub fn next_id(&mut self) -> u16 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Read `count` holding registers starting at `start_addr` (FC03).
    ///
    /// `count` outside 1..=125 is rejected before an id is consumed.
    pub fn issue_read<T: ModbusTransport>(
        &mut self,
        session: &mut T,
        start_addr: u16,
        count: u16,
    ) -> ModbusResult<Vec<u16>> {
        if count == 0 || count > MAX_READ_REGISTERS {
            return Err(ModbusError::invalid_request(format!(
                "register count {} outside 1..={}",
                count, MAX_READ_REGISTERS
            )));
        }

        self.execute(
            session,
            Request::ReadHoldingRegisters { start_addr, count },
        )
    }

    /// Write one holding register (FC06) and verify the echoed acknowledgment.
    pub fn issue_write<T: ModbusTransport>(
        &mut self,
        session: &mut T,
        address: u16,
        value: u16,
    ) -> ModbusResult<()> {
        self.execute(session, Request::WriteSingleRegister { address, value })
            .map(|_| ())
    }

    fn execute<T: ModbusTransport>(
        &mut self,
        session: &mut T,
        request: Request,
    ) -> ModbusResult<Vec<u16>> {
        let txn = Transaction {
            id: self.next_id(),
            request,
        };
        debug!("tx {}: {:?}", txn.id, txn.request);

        session.send(&txn.encode())?;
        let response = session.receive(RESPONSE_BUFFER_SIZE)?;

        txn.resolve(&response).map_err(|err| {
            warn!("tx {}: {}", txn.id, err);
            ModbusError::from(err)
        })
    }
}
