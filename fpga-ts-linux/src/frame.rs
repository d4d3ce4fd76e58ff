//! PTP event frames as seen by the simulated device

use fpga_ts::{
    packet::{RxPacket, TxPacket, ETH_HLEN, OFF_PTP_SEQUENCE_ID, UDP_HLEN},
    time::Time,
};
use tokio::sync::mpsc::UnboundedSender;

const ETHERTYPE_IPV4: u16 = 0x0800;
const IPV4_HLEN: usize = 20;
const IPPROTO_UDP: u8 = 17;
const PTP_EVENT_PORT: u16 = 319;
const PTP_HLEN: usize = 34;
const PTP_SYNC_LEN: usize = PTP_HLEN + 10;

/// Destination MAC of PTP over UDP multicast
const PTP_PRIMARY_MAC: [u8; 6] = [0x01, 0x00, 0x5e, 0x00, 0x01, 0x81];
/// 224.0.1.129
const PTP_PRIMARY_IP: [u8; 4] = [224, 0, 1, 129];

/// What happened to a transmitted frame that asked for a timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxCompletion {
    pub sequence_id: u16,
    pub timestamp: Option<Time>,
}

/// An Ethernet frame carrying a PTPv2 Sync message over UDP/IPv4
#[derive(Debug)]
pub struct Frame {
    data: Vec<u8>,
    sequence_id: u16,
    timestamp_requested: bool,
    in_progress: bool,
    hw_timestamp: Option<Time>,
    completion: Option<UnboundedSender<TxCompletion>>,
}

impl Frame {
    pub fn ptp_sync(sequence_id: u16) -> Self {
        let udp_len = UDP_HLEN + PTP_SYNC_LEN;
        let ip_len = IPV4_HLEN + udp_len;

        let mut data = Vec::with_capacity(ETH_HLEN + ip_len);

        // ethernet
        data.extend_from_slice(&PTP_PRIMARY_MAC);
        data.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
        data.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());

        // ipv4, no options
        data.extend_from_slice(&[0x45, 0x00]);
        data.extend_from_slice(&(ip_len as u16).to_be_bytes());
        data.extend_from_slice(&[0, 0, 0x40, 0x00, 1, IPPROTO_UDP, 0, 0]);
        data.extend_from_slice(&[192, 168, 0, 1]);
        data.extend_from_slice(&PTP_PRIMARY_IP);

        // udp, no checksum
        data.extend_from_slice(&PTP_EVENT_PORT.to_be_bytes());
        data.extend_from_slice(&PTP_EVENT_PORT.to_be_bytes());
        data.extend_from_slice(&(udp_len as u16).to_be_bytes());
        data.extend_from_slice(&[0, 0]);

        // ptp header, messageType Sync, versionPTP 2
        let mut ptp = [0u8; PTP_SYNC_LEN];
        ptp[0] = 0x00;
        ptp[1] = 0x02;
        ptp[2..4].copy_from_slice(&(PTP_SYNC_LEN as u16).to_be_bytes());
        ptp[OFF_PTP_SEQUENCE_ID..OFF_PTP_SEQUENCE_ID + 2]
            .copy_from_slice(&sequence_id.to_be_bytes());
        data.extend_from_slice(&ptp);

        Frame {
            data,
            sequence_id,
            timestamp_requested: false,
            in_progress: false,
            hw_timestamp: None,
            completion: None,
        }
    }

    /// Ask for a hardware transmit timestamp, reported on `completion`
    pub fn request_timestamp(mut self, completion: UnboundedSender<TxCompletion>) -> Self {
        self.timestamp_requested = true;
        self.completion = Some(completion);
        self
    }

    pub fn sequence_id(&self) -> u16 {
        self.sequence_id
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    /// Receive timestamp attached by the device
    pub fn hw_timestamp(&self) -> Option<Time> {
        self.hw_timestamp
    }

    fn finish(self, timestamp: Option<Time>) {
        if let Some(completion) = &self.completion {
            let completion = completion.send(TxCompletion {
                sequence_id: self.sequence_id,
                timestamp,
            });

            if completion.is_err() {
                log::debug!("completion of frame {} not collected", self.sequence_id);
            }
        }
    }
}

impl TxPacket for Frame {
    fn data(&self) -> &[u8] {
        &self.data
    }

    fn hw_timestamp_requested(&self) -> bool {
        self.timestamp_requested
    }

    fn set_in_progress(&mut self) {
        self.in_progress = true;
    }

    fn complete(self, timestamp: Time) {
        self.finish(Some(timestamp))
    }

    fn release(self) {
        self.finish(None)
    }
}

impl RxPacket for Frame {
    fn set_hw_timestamp(&mut self, timestamp: Time) {
        self.hw_timestamp = Some(timestamp);
    }
}
