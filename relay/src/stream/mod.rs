//! Media stream engine.
//!
//! A [`MediaStream`] owns every per-SSRC state machine of one relayed
//! stream: jitter buffers, NACK trackers, receive statistics, retransmit
//! caches, the continuity rewriter and the RTT/loss estimators. Inbound
//! datagrams are handed to [`MediaStream::handle_rtp`] or
//! [`MediaStream::handle_rtcp`]; everything the engine wants to send goes
//! through the stream's [`SendQueue`].
//!
//! Periodic work (NACK rounds, key-frame retries, RR/SR) runs either from
//! the task spawned by [`MediaStream::start`] or by calling
//! [`MediaStream::poll`] directly.

pub mod direction;
pub mod outcome;

pub use direction::{InboundDirection, OutboundDirection, SendCounters};
pub use outcome::{NetworkReport, ReceiveStats, RtcpOutcome, TickReport};

use crate::clock::Clock;
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::key_frame::KeyFrameRequest;
use crate::send_queue::{Route, RouteSinks, SendPriority, SendQueue, run_sender_loop};
use crate::sink::{TelemetrySink, keys};
use logging::Logger;
use network::RtpPacketView;
use network::codec::rtcp::{
    FullIntraRequest, GenericNack, PictureLossIndication, ReceiverReport, Remb, ReportBlock,
    RtcpPacket, SenderReport, SourceDescription, parse_compound,
};
use network::continuity::{AssignOutcome, SsrcContinuityRewriter};
use network::media::MediaKind;
use network::nack::{NackDecision, on_nack_received};
use network::stats::{LossAndBitrateTracker, RttEstimator};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// One relayed stream and its reliability state
pub struct MediaStream {
    id: u32,
    local_ssrc: u32,
    config: RelayConfig,
    clock: Arc<dyn Clock>,
    logger: Logger,
    telemetry: Arc<dyn TelemetrySink>,
    sinks: RouteSinks,
    send_queue: Arc<SendQueue>,
    inbound: RwLock<HashMap<u32, Arc<InboundDirection>>>,
    outbound: RwLock<HashMap<u32, Arc<OutboundDirection>>>,
    rewriter: Mutex<SsrcContinuityRewriter>,
    rtt: Mutex<RttEstimator>,
    loss: Mutex<LossAndBitrateTracker>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MediaStream {
    /// Creates a stream and registers the sources listed in `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the component
    /// logger cannot be created.
    pub fn new(
        config: RelayConfig,
        sinks: RouteSinks,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn TelemetrySink>,
        logger: &Logger,
    ) -> Result<Self> {
        config.validate()?;

        let local_ssrc = match config.stream.local_ssrc {
            0 => loop {
                let candidate: u32 = rand::random();
                if candidate != 0 {
                    break candidate;
                }
            },
            ssrc => ssrc,
        };

        let mut rtt = RttEstimator::new(config.rtcp.history_depth);
        rtt.set_clock_rate(MediaKind::Audio, config.stream.audio_clock_rate);
        rtt.set_clock_rate(MediaKind::Video, config.stream.video_clock_rate);

        let stream = MediaStream {
            id: config.stream.stream_id,
            local_ssrc,
            logger: logger.for_component("Stream")?,
            telemetry,
            clock,
            sinks,
            send_queue: Arc::new(SendQueue::new(config.send_queue.capacity)),
            inbound: RwLock::new(HashMap::new()),
            outbound: RwLock::new(HashMap::new()),
            rewriter: Mutex::new(SsrcContinuityRewriter::new(config.continuity.to_config())),
            rtt: Mutex::new(rtt),
            loss: Mutex::new(LossAndBitrateTracker::new(config.network_status.window_ms)),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            config,
        };

        for source in stream.config.stream.sources.clone() {
            stream.assign_source(
                source.kind.into(),
                source.downstream_ssrc,
                source.upstream_ssrc,
                source.source_id,
            );
            if source.payload_type.is_some() {
                stream.set_payload_type(source.downstream_ssrc, source.payload_type);
            }
        }

        stream.logger.info(&format!(
            "Stream {} created (local SSRC: {:#010x}, sources: {})",
            stream.id,
            local_ssrc,
            stream.config.stream.sources.len()
        ));
        Ok(stream)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// SSRC we use as sender of RR and feedback
    pub fn local_ssrc(&self) -> u32 {
        self.local_ssrc
    }

    pub fn send_queue(&self) -> &Arc<SendQueue> {
        &self.send_queue
    }

    // ========================================================================
    // SOURCES
    // ========================================================================

    /// Registers an upstream source we receive. Returns false if it existed.
    pub fn add_inbound(&self, kind: MediaKind, ssrc: u32) -> bool {
        let mut inbound = self.inbound.write();
        if inbound.contains_key(&ssrc) {
            return false;
        }
        let direction = InboundDirection::new(
            kind,
            ssrc,
            self.config.stream.clock_rate(kind),
            self.config.jitter_buffer.to_config(),
            self.config.nack.to_config(),
            self.config.rtcp.fir_retry_ms,
            self.config.rtcp.fir_max_attempts,
        );
        inbound.insert(ssrc, Arc::new(direction));
        self.logger.debug(&format!("Inbound {} source {:#010x} added", kind.as_str(), ssrc));
        true
    }

    /// Removes an upstream source and its state.
    pub fn remove_inbound(&self, ssrc: u32) -> bool {
        let removed = self.inbound.write().remove(&ssrc).is_some();
        if removed {
            self.loss.lock().remove_receive_source(ssrc);
        }
        removed
    }

    /// Points the downstream slot `downstream_ssrc` at `upstream_ssrc`.
    ///
    /// Creates the inbound and outbound state as needed. Switching a video
    /// slot to a new source asks that source for a key frame.
    pub fn assign_source(
        &self,
        kind: MediaKind,
        downstream_ssrc: u32,
        upstream_ssrc: u32,
        source_id: u32,
    ) -> AssignOutcome {
        self.add_inbound(kind, upstream_ssrc);
        self.outbound.write().entry(downstream_ssrc).or_insert_with(|| {
            Arc::new(OutboundDirection::new(
                kind,
                downstream_ssrc,
                self.config.stream.clock_rate(kind),
                self.config.retransmit.to_config(),
            ))
        });

        let outcome = self
            .rewriter
            .lock()
            .assign(downstream_ssrc, upstream_ssrc, source_id);

        match outcome {
            AssignOutcome::Created => self.logger.info(&format!(
                "Slot {:#010x} created for source {:#010x}",
                downstream_ssrc, upstream_ssrc
            )),
            AssignOutcome::Switched { previous_upstream } => self.logger.info(&format!(
                "Slot {:#010x} switched from {:#010x} to {:#010x}",
                downstream_ssrc, previous_upstream, upstream_ssrc
            )),
            AssignOutcome::Unchanged => {}
        }

        if kind == MediaKind::Video && outcome != AssignOutcome::Unchanged {
            self.request_key_frame(upstream_ssrc);
        }
        outcome
    }

    /// Stops relaying into `downstream_ssrc`. Returns false if it had no source.
    pub fn unassign_source(&self, downstream_ssrc: u32) -> bool {
        match self.rewriter.lock().unassign(downstream_ssrc) {
            Some(slot) => {
                self.logger.info(&format!(
                    "Slot {:#010x} released (source {:#010x}, {} packets relayed)",
                    downstream_ssrc, slot.upstream_ssrc, slot.packets_relayed
                ));
                true
            }
            None => false,
        }
    }

    /// Forces (or clears) the payload type written on a slot.
    pub fn set_payload_type(&self, downstream_ssrc: u32, payload_type: Option<u8>) {
        self.rewriter
            .lock()
            .set_payload_type(downstream_ssrc, payload_type);
    }

    fn inbound_direction(&self, ssrc: u32) -> Option<Arc<InboundDirection>> {
        self.inbound.read().get(&ssrc).cloned()
    }

    fn outbound_direction(&self, ssrc: u32) -> Option<Arc<OutboundDirection>> {
        self.outbound.read().get(&ssrc).cloned()
    }

    fn inbound_directions(&self) -> Vec<Arc<InboundDirection>> {
        self.inbound.read().values().cloned().collect()
    }

    fn outbound_directions(&self) -> Vec<Arc<OutboundDirection>> {
        self.outbound.read().values().cloned().collect()
    }

    // ========================================================================
    // RTP
    // ========================================================================

    /// Processes one inbound RTP datagram.
    ///
    /// Returns how many packets were released from the jitter buffer and
    /// queued downstream. Packets from unregistered sources are ignored.
    ///
    /// # Errors
    ///
    /// Returns error if the datagram is not a valid RTP packet.
    pub fn handle_rtp(&self, data: Vec<u8>) -> Result<usize> {
        let packet = match RtpPacketView::parse(data) {
            Ok(packet) => packet,
            Err(e) => {
                self.logger.debug(&format!("Dropping malformed RTP: {}", e));
                return Err(e.into());
            }
        };

        let ssrc = packet.ssrc();
        let Some(direction) = self.inbound_direction(ssrc) else {
            self.logger
                .debug(&format!("RTP from unknown SSRC {:#010x} ignored", ssrc));
            return Ok(0);
        };

        let now = self.clock.now_ms();
        let sequence = packet.sequence_number();

        direction
            .statistics
            .lock()
            .on_rtp(sequence, packet.timestamp(), now);

        if self.config.nack.enabled {
            let observation = direction.nack.lock().observe(sequence, now);
            if observation.resynced {
                self.logger.info(&format!(
                    "Source {:#010x} jumped to seq {}, NACK state reset",
                    ssrc, sequence
                ));
            } else if observation.new_gaps > 0 {
                self.logger.debug(&format!(
                    "Source {:#010x}: {} new gaps before seq {}",
                    ssrc, observation.new_gaps, sequence
                ));
            }
        }

        self.loss
            .lock()
            .on_packet_received(direction.kind, packet.len(), now);

        let released = {
            let mut jitter_buffer = direction.jitter_buffer.lock();
            if let Err(rejection) = jitter_buffer.push(packet) {
                self.logger.debug(&format!(
                    "Source {:#010x}: seq {} not buffered ({:?})",
                    ssrc, sequence, rejection
                ));
            }
            let mut released = Vec::new();
            while let Some(packet) = jitter_buffer.pop(false) {
                released.push(packet);
            }
            released
        };

        Ok(released
            .into_iter()
            .map(|packet| self.relay(packet))
            .filter(|queued| *queued)
            .count())
    }

    /// Releases everything buffered for every source, regardless of depth.
    pub fn flush_jitter_buffers(&self) -> usize {
        let mut relayed = 0;
        for direction in self.inbound_directions() {
            let released: Vec<RtpPacketView> = {
                let mut jitter_buffer = direction.jitter_buffer.lock();
                std::iter::from_fn(|| jitter_buffer.pop(true)).collect()
            };
            for packet in released {
                if self.relay(packet) {
                    relayed += 1;
                }
            }
        }
        relayed
    }

    /// Rewrites a released packet onto its slot and queues it downstream.
    fn relay(&self, mut packet: RtpPacketView) -> bool {
        let upstream = packet.ssrc();
        let Some(result) = self.rewriter.lock().rewrite(&mut packet) else {
            return false;
        };

        if result.jump_detected {
            self.logger.warn(&format!(
                "Slot {:#010x}: sequence jump to {} from source {:#010x}",
                result.downstream_ssrc, result.sequence, upstream
            ));
        }

        let Some(outbound) = self.outbound_direction(result.downstream_ssrc) else {
            return false;
        };

        let now = self.clock.now_ms();
        let payload_len = packet.payload().len() as u32;
        let bytes = packet.into_bytes();

        outbound
            .retransmit
            .lock()
            .push(result.sequence, bytes.clone(), now);
        {
            let mut counters = outbound.counters.lock();
            counters.packets = counters.packets.wrapping_add(1);
            counters.octets = counters.octets.wrapping_add(payload_len);
            counters.last_rtp_timestamp = result.timestamp;
            counters.last_send_time = now;
        }
        self.loss.lock().on_packet_sent(bytes.len(), now);

        let priority = match outbound.kind {
            MediaKind::Audio => SendPriority::Audio,
            MediaKind::Video => SendPriority::Default,
        };
        self.send_queue.push(priority, Route::Downstream, bytes)
    }

    // ========================================================================
    // RTCP
    // ========================================================================

    /// Processes one inbound compound RTCP datagram.
    ///
    /// # Errors
    ///
    /// Returns error if the datagram is malformed; nothing is applied then.
    pub fn handle_rtcp(&self, data: &[u8]) -> Result<RtcpOutcome> {
        let packets = match parse_compound(data) {
            Ok(packets) => packets,
            Err(e) => {
                self.logger.debug(&format!("Dropping malformed RTCP: {}", e));
                return Err(e.into());
            }
        };

        let now = self.clock.now_ms();
        let mut outcome = RtcpOutcome::default();

        for packet in packets {
            match packet {
                RtcpPacket::SenderReport(sr) => {
                    self.on_sender_report(&sr, now, &mut outcome);
                    self.on_report_blocks(&sr.report_blocks, now, &mut outcome);
                }
                RtcpPacket::ReceiverReport(rr) => {
                    self.on_report_blocks(&rr.report_blocks, now, &mut outcome);
                }
                RtcpPacket::Nack(nack) => self.on_nack(&nack, now, &mut outcome),
                RtcpPacket::Pli(pli) => self.on_key_frame_request(pli.media_ssrc, &mut outcome),
                RtcpPacket::Fir(fir) => {
                    for entry in &fir.entries {
                        self.on_key_frame_request(entry.ssrc, &mut outcome);
                    }
                }
                RtcpPacket::LegacyFir { media_ssrc } => {
                    self.on_key_frame_request(media_ssrc, &mut outcome)
                }
                RtcpPacket::Remb(remb) => {
                    self.on_remb(&remb);
                    outcome.remb = Some(remb.bitrate);
                }
                RtcpPacket::Bye(bye) => {
                    self.logger.info(&format!(
                        "BYE from {:?} ({})",
                        bye.ssrcs,
                        bye.reason.as_deref().unwrap_or("no reason")
                    ));
                    outcome.bye = true;
                }
                RtcpPacket::SourceDescription(_) => {}
            }
        }

        Ok(outcome)
    }

    fn on_sender_report(&self, sr: &SenderReport, now: u64, outcome: &mut RtcpOutcome) {
        let Some(direction) = self.inbound_direction(sr.ssrc) else {
            self.logger
                .debug(&format!("SR from unknown SSRC {:#010x}", sr.ssrc));
            return;
        };
        direction
            .statistics
            .lock()
            .on_sr(sr.ntp, sr.rtp_timestamp, now);
        self.rtt
            .lock()
            .on_remote_sr(direction.kind, sr.ntp, sr.rtp_timestamp);
        outcome.sender_reports += 1;
    }

    fn on_report_blocks(&self, blocks: &[ReportBlock], now: u64, outcome: &mut RtcpOutcome) {
        for block in blocks {
            if self.outbound_direction(block.ssrc).is_none() {
                continue;
            }

            self.loss.lock().on_receiver_report(
                block.ssrc,
                block.extended_highest_seq,
                block.cumulative_packets_lost.max(0) as u32,
                now,
            );

            let sample = self.rtt.lock().on_rr_received(
                block.ssrc,
                block.last_sr,
                block.delay_since_last_sr,
                now,
            );
            if let Some(sample) = sample {
                self.telemetry.report(self.id, keys::RTT, sample.last);
                self.telemetry.report(self.id, keys::AVG_RTT, sample.avg);
                outcome.rtt_samples.push((block.ssrc, sample));
            }
        }
    }

    fn on_nack(&self, nack: &GenericNack, now: u64, outcome: &mut RtcpOutcome) {
        let Some(direction) = self.outbound_direction(nack.media_ssrc) else {
            self.logger
                .debug(&format!("NACK for unknown SSRC {:#010x}", nack.media_ssrc));
            return;
        };

        let retransmission = on_nack_received(&mut direction.retransmit.lock(), &nack.lost, now);
        let requested = nack.lost.len();
        let resent = retransmission.packets.len();

        for bytes in retransmission.packets {
            self.send_queue
                .push(SendPriority::Retransmit, Route::Downstream, bytes);
        }

        self.logger.debug(&format!(
            "NACK for {:#010x}: {} requested, {} resent",
            nack.media_ssrc, requested, resent
        ));
        outcome.retransmitted += resent;
        outcome.lost_retransmitted += retransmission.first_time;
        self.telemetry
            .report(self.id, keys::RETRANSMITTED, outcome.retransmitted as i64);
        self.telemetry.report(
            self.id,
            keys::LOST_RETRANSMITTED,
            outcome.lost_retransmitted as i64,
        );
    }

    fn on_key_frame_request(&self, downstream_ssrc: u32, outcome: &mut RtcpOutcome) {
        let upstream = self
            .rewriter
            .lock()
            .slot(downstream_ssrc)
            .map(|slot| slot.upstream_ssrc);
        match upstream {
            Some(upstream) => {
                if self.request_key_frame(upstream) {
                    outcome.key_frame_requests += 1;
                }
            }
            None => self.logger.debug(&format!(
                "Key frame request for unassigned slot {:#010x}",
                downstream_ssrc
            )),
        }
    }

    fn on_remb(&self, remb: &Remb) {
        let kind = remb
            .ssrcs
            .iter()
            .find_map(|ssrc| self.outbound_direction(*ssrc).map(|d| d.kind))
            .unwrap_or(MediaKind::Video);
        self.loss.lock().set_target_bitrate(kind, remb.bitrate);
        self.telemetry.report(
            self.id,
            keys::TARGET_BITRATE,
            self.loss.lock().target_bitrate(),
        );
    }

    // ========================================================================
    // KEY FRAMES
    // ========================================================================

    /// Asks `upstream_ssrc` for a key frame with a PLI and a FIR.
    ///
    /// Returns false if the source is unknown or a request is already
    /// pending inside the retry interval.
    pub fn request_key_frame(&self, upstream_ssrc: u32) -> bool {
        let Some(direction) = self.inbound_direction(upstream_ssrc) else {
            return false;
        };
        let request = direction.key_frames.lock().request(self.clock.now_ms());
        match request {
            Some(request) => {
                self.send_key_frame_request(upstream_ssrc, request);
                true
            }
            None => false,
        }
    }

    /// Marks a key frame from `upstream_ssrc` as received.
    pub fn on_key_frame_received(&self, upstream_ssrc: u32) {
        if let Some(direction) = self.inbound_direction(upstream_ssrc) {
            direction.key_frames.lock().on_key_frame_received();
        }
    }

    fn send_key_frame_request(&self, upstream_ssrc: u32, request: KeyFrameRequest) {
        let mut bytes = PictureLossIndication::new(self.local_ssrc, upstream_ssrc).to_bytes();
        bytes.extend(
            FullIntraRequest::new(self.local_ssrc, upstream_ssrc, request.fir_sequence).to_bytes(),
        );
        self.send_queue.push(SendPriority::Rtcp, Route::Upstream, bytes);
        self.logger.debug(&format!(
            "Key frame requested from {:#010x} (FIR seq {})",
            upstream_ssrc, request.fir_sequence
        ));
    }

    // ========================================================================
    // PERIODIC WORK
    // ========================================================================

    /// Runs one round of periodic work.
    pub fn poll(&self) -> TickReport {
        let mut report = self.poll_nacks();
        report.merge(self.poll_reports());
        report
    }

    /// Sends due NACKs and retries unanswered key-frame requests.
    pub fn poll_nacks(&self) -> TickReport {
        let now = self.clock.now_ms();
        let mut report = TickReport::default();

        for direction in self.inbound_directions() {
            if self.config.nack.enabled {
                let decision = direction.nack.lock().build_nack(now);
                match decision {
                    NackDecision::Idle => {}
                    NackDecision::Nack(lost) => {
                        self.logger.debug(&format!(
                            "NACK {} packets of {:#010x}",
                            lost.len(),
                            direction.ssrc
                        ));
                        let bytes = GenericNack::new(self.local_ssrc, direction.ssrc, lost).to_bytes();
                        self.send_queue.push(SendPriority::Rtcp, Route::Upstream, bytes);
                        report.nacks += 1;
                    }
                    NackDecision::RequestKeyFrame { dropped } => {
                        self.logger.warn(&format!(
                            "Source {:#010x}: {} losses outstanding, requesting key frame",
                            direction.ssrc, dropped
                        ));
                        if self.request_key_frame(direction.ssrc) {
                            report.key_frame_requests += 1;
                        }
                    }
                }
            }

            let retry = direction.key_frames.lock().poll(now);
            if let Some(request) = retry {
                self.send_key_frame_request(direction.ssrc, request);
                report.key_frame_requests += 1;
            }
        }

        report
    }

    /// Sends due Receiver and Sender Reports, then publishes telemetry.
    pub fn poll_reports(&self) -> TickReport {
        let now = self.clock.now_ms();
        let mut report = TickReport::default();

        for direction in self.inbound_directions() {
            let block = {
                let mut last_rr = direction.last_rr.lock();
                let due = last_rr
                    .is_none_or(|last| now.saturating_sub(last) >= self.config.rtcp.rr_interval_ms);
                let mut statistics = direction.statistics.lock();
                if !due || !statistics.has_received() {
                    continue;
                }
                *last_rr = Some(now);
                statistics.build_report_block(direction.ssrc, now)
            };

            let fraction = block.fraction_lost as u32 * 100 / 256;
            self.loss
                .lock()
                .set_receive_fraction_lost(direction.ssrc, fraction);

            let mut bytes = ReceiverReport::new(self.local_ssrc, vec![block]).to_bytes();
            bytes.extend(
                SourceDescription::with_cname(self.local_ssrc, &self.config.rtcp.cname).to_bytes(),
            );
            self.send_queue.push(SendPriority::Rtcp, Route::Upstream, bytes);
            report.receiver_reports += 1;
        }

        for direction in self.outbound_directions() {
            let counters = *direction.counters.lock();
            {
                let mut last_sr = direction.last_sr.lock();
                let due = match *last_sr {
                    Some((time, packets)) => {
                        packets != counters.packets
                            && now.saturating_sub(time) >= self.config.rtcp.sr_interval_ms
                    }
                    None => counters.packets > 0,
                };
                if !due {
                    continue;
                }
                *last_sr = Some((now, counters.packets));
            }

            let ntp = self.clock.ntp_now();
            let sr = SenderReport::new(
                direction.ssrc,
                ntp,
                direction.rtp_timestamp_at(&counters, now),
                counters.packets,
                counters.octets,
            );
            self.rtt.lock().record_sr_sent(direction.ssrc, ntp, now);

            let mut bytes = sr.to_bytes();
            bytes.extend(
                SourceDescription::with_cname(direction.ssrc, &self.config.rtcp.cname).to_bytes(),
            );
            self.send_queue.push(SendPriority::Rtcp, Route::Downstream, bytes);
            report.sender_reports += 1;
        }

        if report.receiver_reports > 0 || report.sender_reports > 0 {
            self.publish_telemetry();
        }
        report
    }

    fn publish_telemetry(&self) {
        let network = self.network_report();
        let snapshot = &network.snapshot;
        self.telemetry.report(
            self.id,
            keys::SEND_FRACTION_LOST,
            snapshot.send_fraction_lost as i64,
        );
        self.telemetry.report(
            self.id,
            keys::RECV_FRACTION_LOST,
            snapshot.receive_fraction_lost as i64,
        );
        self.telemetry.report(self.id, keys::SEND_BITRATE, snapshot.send_bitrate as i64);
        self.telemetry.report(self.id, keys::RECV_BITRATE, snapshot.receive_bitrate as i64);
        self.telemetry.report(self.id, keys::TARGET_BITRATE, snapshot.target_bitrate);
        self.telemetry.report(self.id, keys::NETWORK_STATUS, network.level as i64);
    }

    /// Writes everything queued into the sinks from the calling thread.
    pub fn flush_send_queue(&self) -> usize {
        self.send_queue.drain_into(&self.sinks, None)
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Aggregate loss, bitrate and RTT view of the link.
    pub fn network_report(&self) -> NetworkReport {
        let rtt = match self.rtt.lock().latest_rtt() {
            0 => -1,
            rtt => rtt,
        };
        let loss = self.loss.lock();
        NetworkReport {
            snapshot: loss.snapshot(),
            rtt,
            level: loss.status_level(rtt),
        }
    }

    /// Receive statistics for an upstream source.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::UnknownSsrc`] if the source is not registered.
    pub fn receive_stats(&self, upstream_ssrc: u32) -> Result<ReceiveStats> {
        let direction = self
            .inbound_direction(upstream_ssrc)
            .ok_or(RelayError::UnknownSsrc(upstream_ssrc))?;
        let statistics = direction.statistics.lock();
        Ok(ReceiveStats {
            expected: statistics.expected(),
            received: statistics.received(),
            lost: statistics.lost(),
            jitter: statistics.jitter(),
            extended_highest_seq: statistics.extended_highest_seq(),
        })
    }

    /// Send counters of a downstream slot.
    pub fn send_counters(&self, downstream_ssrc: u32) -> Option<SendCounters> {
        self.outbound_direction(downstream_ssrc)
            .map(|direction| *direction.counters.lock())
    }

    /// Latest RTT sample measured on a downstream slot.
    pub fn rtt_sample(&self, downstream_ssrc: u32) -> Option<network::stats::RttSample> {
        self.rtt.lock().sample(downstream_ssrc)
    }

    /// Sender wall-clock time (NTP ms) of an upstream RTP timestamp, -1 if unknown.
    pub fn estimate_remote_ntp(&self, kind: MediaKind, rtp_timestamp: u32) -> i64 {
        self.rtt.lock().estimate_remote_ntp(kind, rtp_timestamp)
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Spawns the periodic task and the sender loop. Calling it twice is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return;
        }

        let sender_logger = self
            .logger
            .for_component("Sender")
            .unwrap_or_else(|_| self.logger.clone());
        tasks.push(tokio::spawn(run_sender_loop(
            self.send_queue.clone(),
            self.sinks.clone(),
            self.cancel.clone(),
            sender_logger,
        )));

        let stream = Arc::clone(self);
        tasks.push(tokio::spawn(async move { stream.run_periodic().await }));

        self.logger.info(&format!("Stream {} started", self.id));
    }

    async fn run_periodic(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.rtcp.tick_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.poll();
                }
            }
        }
    }

    /// Stops the background tasks and waits for them to finish.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                self.logger.warn(&format!("Stream task ended abnormally: {}", e));
            }
        }
        self.logger.info(&format!(
            "Stream {} stopped ({} packets left in send queue)",
            self.id,
            self.send_queue.len()
        ));
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
