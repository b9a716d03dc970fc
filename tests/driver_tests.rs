//! Integration tests for the signal drivers

use rs_dccgen::config::{BitTiming, PulseDriverConfig};
use rs_dccgen::hal::mock::{MockPin, MockPulseChannel, MockTimer};
use rs_dccgen::ops::{self, Direction};
use rs_dccgen::signal::{BufferedPulseDriver, DualTimerDriver, PulseRing};
use rs_dccgen::{Packet, Pulse, RegisterList};

/// Expected half-periods for one packet at nominal timing.
fn half_periods(packet: &Packet) -> Vec<u16> {
    let timing = BitTiming::default();
    (0..packet.len())
        .map(|i| timing.half_period_us(packet.bit(i)))
        .collect()
}

#[test]
fn timer_driver_full_idle_packet_waveform() {
    let regs: RegisterList<4> = RegisterList::new();
    let mut driver = DualTimerDriver::new(
        MockPin::new(),
        MockTimer::new(),
        MockTimer::new(),
        &regs,
        BitTiming::default(),
    );

    let idle = Packet::idle();
    driver.start().unwrap();
    for _ in 1..idle.len() {
        driver.on_half_period().unwrap();
        driver.on_period_start().unwrap();
    }
    driver.on_half_period().unwrap();

    let (pin, full, half) = driver.release();

    // Symmetric square wave: one high and one low transition per bit.
    assert_eq!(pin.transitions.len(), 2 * idle.len());
    for (i, pair) in pin.transitions.chunks(2).enumerate() {
        assert_eq!(pair, [true, false], "bit {i}");
    }

    // Full timer armed at twice the half timer, every bit.
    let expected = half_periods(&idle);
    assert_eq!(half.armed, expected.iter().map(|&h| h as u32).collect::<Vec<_>>());
    assert_eq!(
        full.armed,
        expected.iter().map(|&h| h as u32 * 2).collect::<Vec<_>>()
    );
}

#[test]
fn pulse_driver_never_underruns_with_threshold_service() {
    let regs: RegisterList<4> = RegisterList::new();
    let payload = ops::throttle(3, 50, Direction::Forward).unwrap();
    regs.load(1, Packet::encode(&payload, 0).unwrap()).unwrap();

    let channel = MockPulseChannel::new(64);
    let mut driver = BufferedPulseDriver::new(
        channel,
        &regs,
        BitTiming::default(),
        PulseDriverConfig::default().with_refill_threshold(16),
    );

    driver.prime().unwrap();
    driver.start().unwrap();

    // Simulate the peripheral draining in odd-sized bursts while the
    // control loop services the driver; the channel must never run dry.
    let mut drained = Vec::new();
    for burst in [5usize, 13, 7, 16, 3, 11, 9, 15, 6, 14].iter().cycle().take(40) {
        drained.extend(driver.channel_mut().drain(*burst));
        driver.service().unwrap();
    }

    let channel = driver.release();
    assert_eq!(channel.underruns, 0, "channel ran dry");

    // The drained pulses replay the register list's bit stream exactly:
    // the initial idle frame followed by the throttle packet on repeat.
    let mut expected = half_periods(&Packet::idle());
    let throttle = Packet::encode(&payload, 0).unwrap();
    while expected.len() < drained.len() {
        expected.extend(half_periods(&throttle));
    }
    for (i, pulse) in drained.iter().enumerate() {
        assert_eq!(*pulse, Pulse::symmetric(expected[i]), "pulse {i}");
    }
}

#[test]
fn ring_backed_driver_matches_timer_driver_output() {
    // Both driver families must produce the same period stream for the
    // same register contents.
    let regs_a: RegisterList<4> = RegisterList::new();
    let regs_b: RegisterList<4> = RegisterList::new();

    let ring: PulseRing<256> = PulseRing::new();
    let mut pulse_driver = BufferedPulseDriver::new(
        &ring,
        &regs_a,
        BitTiming::default(),
        PulseDriverConfig::default(),
    );
    pulse_driver.prime().unwrap();

    let mut timer_driver = DualTimerDriver::new(
        MockPin::new(),
        MockTimer::new(),
        MockTimer::new(),
        &regs_b,
        BitTiming::default(),
    );
    timer_driver.start().unwrap();
    for _ in 1..256 {
        timer_driver.on_half_period().unwrap();
        timer_driver.on_period_start().unwrap();
    }

    let (_, full, _) = timer_driver.release();
    for (i, armed) in full.armed.iter().enumerate() {
        let pulse = ring.pop().unwrap();
        assert_eq!(pulse.period_us(), *armed, "bit {i}");
    }
}
