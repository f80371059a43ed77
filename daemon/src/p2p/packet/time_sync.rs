use arcadia_common::{
    serializer::{Reader, ReaderError, Serializer, Writer},
    time::TimestampNanos,
};

// NTP-style time exchange.
// org: probe transmit time at the sender; rec: probe receive time at the
// responder; xmt: reply transmit time at the responder; dst: reply receive
// time, filled in locally and never meaningful on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct TimeMessage {
    pub org: TimestampNanos,
    pub rec: TimestampNanos,
    pub xmt: TimestampNanos,
    pub dst: TimestampNanos,
}

impl TimeMessage {
    // A fresh probe carries only its transmit time
    pub fn probe(now: TimestampNanos) -> Self {
        Self {
            org: now,
            ..Default::default()
        }
    }

    // The responder echoes org, stamps rec and xmt
    pub fn reply_to(probe: &TimeMessage, rec: TimestampNanos, xmt: TimestampNanos) -> Self {
        Self {
            org: probe.org,
            rec,
            xmt,
            dst: 0,
        }
    }

    // Peer clock offset relative to ours, positive when the peer is ahead
    pub fn clock_offset(&self) -> TimestampNanos {
        ((self.rec - self.org) + (self.xmt - self.dst)) / 2
    }

    // Round trip time of the exchange, excluding the peer's processing time
    pub fn round_trip(&self) -> TimestampNanos {
        (self.dst - self.org) - (self.xmt - self.rec)
    }
}

impl Serializer for TimeMessage {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let org = reader.read_i64()?;
        let rec = reader.read_i64()?;
        let xmt = reader.read_i64()?;
        let dst = reader.read_i64()?;
        Ok(Self { org, rec, xmt, dst })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_i64(&self.org);
        writer.write_i64(&self.rec);
        writer.write_i64(&self.xmt);
        writer.write_i64(&self.dst);
    }

    fn size(&self) -> usize {
        4 * 8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let message = TimeMessage {
            org: 1,
            rec: 2,
            xmt: 3,
            dst: 4,
        };
        let decoded = TimeMessage::from_bytes(&message.to_bytes()).unwrap();
        assert_eq!(message, decoded);
    }

    #[test]
    fn test_offset_and_rtt() {
        // Peer clock is 100ns ahead, each leg takes 10ns
        let mut message = TimeMessage::probe(1_000);
        message.rec = 1_110; // 1_010 on our clock + 100 offset
        message.xmt = 1_120;
        message.dst = 1_020;

        assert_eq!(message.clock_offset(), 100);
        assert_eq!(message.round_trip(), 10);
    }

    #[test]
    fn test_negative_offset() {
        // Peer clock is 50ns behind
        let mut message = TimeMessage::probe(1_000);
        message.rec = 960; // arrived at our 1_010, peer reads 960
        message.xmt = 970;
        message.dst = 1_020;

        assert_eq!(message.clock_offset(), -50);
        assert_eq!(message.round_trip(), 10);
    }
}
