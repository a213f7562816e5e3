use std::io::Read;

use crate::Result;

/// MPEG program streams
pub mod ps;

use ps::{PacketRecord, PsParser};

/// Checkpoint callbacks invoked by [`PsParser::run`].
///
/// Each callback sees the parser positioned at the start of the unit it
/// announces and may consume bytes through the parser's cursor. After the
/// callback returns the parser moves to the end of the unit itself, so a
/// handler that consumed nothing still stays in sync.
pub trait Handler<R: Read> {
    /// Called for every byte discarded while looking for a start code.
    fn skip(&mut self, _parser: &mut PsParser<R>) -> Result<()> {
        Ok(())
    }

    /// Called after a pack header is decoded into [`PsParser::pack`].
    fn pack(&mut self, _parser: &mut PsParser<R>) -> Result<()> {
        Ok(())
    }

    /// Called after a system header is decoded into [`PsParser::system_header`].
    fn system_header(&mut self, _parser: &mut PsParser<R>) -> Result<()> {
        Ok(())
    }

    /// Called for every packet that passed [`Handler::packet_check`].
    fn packet(&mut self, _parser: &mut PsParser<R>) -> Result<()> {
        Ok(())
    }

    /// Returns true if the packet header should be rejected as invalid.
    ///
    /// Rejected packets are not counted; the parser advances one byte and
    /// resynchronizes.
    fn packet_check(&self, packet: &PacketRecord) -> bool;

    /// Called when an end code is found.
    fn end(&mut self, _parser: &mut PsParser<R>) -> Result<()> {
        Ok(())
    }
}
