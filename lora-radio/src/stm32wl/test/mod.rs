use fixtures::{init_radio, Bench, Event};

use crate::fakes::Switch;
use crate::mod_params::*;
use crate::mod_traits::LoRaRadio;
use crate::settings::LoraParams;

const CHANNEL: u32 = 868_100_000;

async fn lora_rx(bench: &mut Bench, rx_continuous: bool) {
    bench.radio.set_channel(CHANNEL).await.unwrap();
    bench
        .radio
        .set_rx_config(
            RadioModem::LoRa,
            0,
            7,
            1,
            0,
            8,
            5,
            false,
            0,
            true,
            false,
            0,
            false,
            rx_continuous,
        )
        .await
        .unwrap();
    bench.radio.receive().await.unwrap();
}

async fn lora_tx(bench: &mut Bench, payload: &[u8]) {
    bench.radio.set_public_network(true).await.unwrap();
    bench.radio.set_channel(CHANNEL).await.unwrap();
    bench
        .radio
        .set_tx_config(RadioModem::LoRa, 14, 0, 0, 7, 1, 8, false, true, false, 0, false, 3000)
        .await
        .unwrap();
    bench.radio.send(payload).await.unwrap();
}

async fn fsk_rx_config(bench: &mut Bench) {
    bench
        .radio
        .set_rx_config(
            RadioModem::Fsk,
            50_000,
            50_000,
            0,
            83_333,
            5,
            8,
            false,
            0,
            true,
            false,
            0,
            false,
            false,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn init_configures_the_radio() {
    let bench = init_radio().await;
    let subghz = bench.subghz.borrow();
    assert_eq!(
        subghz.commands[..7],
        [
            vec![0x80, 0x00],
            vec![0x96, 0x01],
            vec![0x07],
            // 1.7 V, 10 ms wakeup
            vec![0x97, 0x01, 0x00, 0x02, 0x80],
            vec![0x89, 0x7f],
            vec![0x8f, 0x00, 0x00],
            vec![0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        ]
    );
    // Already in GFSK after reset
    assert!(subghz.sent(0x8a).is_empty());
    // RxGain and TxModulation kept across warm starts
    assert_eq!(subghz.register(0x029f), 2);
    assert_eq!(
        [
            subghz.register(0x02a0),
            subghz.register(0x02a1),
            subghz.register(0x02a2),
            subghz.register(0x02a3)
        ],
        [0x08, 0xac, 0x08, 0x89]
    );
    assert_eq!(bench.radio.get_status(), RadioState::Idle);
    assert_eq!(bench.radio.settings().modem, RadioModem::Fsk);
}

#[tokio::test]
async fn image_is_calibrated_on_first_channel() {
    let mut bench = init_radio().await;
    bench.radio.set_channel(CHANNEL).await.unwrap();
    bench.radio.set_channel(915_000_000).await.unwrap();
    assert_eq!(bench.sent(0x98), vec![vec![0x98, 0xd7, 0xdb]]);
    assert_eq!(bench.sent(0x86)[0], vec![0x86, 0x36, 0x41, 0x99, 0x9a]);
    assert_eq!(bench.last(0x86), Some(vec![0x86, 0x39, 0x30, 0x00, 0x00]));
    assert_eq!(bench.radio.settings().channel, 915_000_000);
}

#[tokio::test]
async fn lora_tx_done() {
    let mut bench = init_radio().await;
    lora_tx(&mut bench, b"hello").await;

    assert_eq!(bench.last(0x8b), Some(vec![0x8b, 0x07, 0x04, 0x01, 0x00]));
    assert_eq!(
        bench.last(0x8c),
        Some(vec![0x8c, 0x00, 0x08, 0x00, 0x05, 0x01, 0x00])
    );
    // 14 dBm on the low power PA
    assert_eq!(bench.last(0x95), Some(vec![0x95, 0x04, 0x00, 0x01, 0x01]));
    assert_eq!(bench.last(0x8e), Some(vec![0x8e, 14, 0x02]));
    assert_eq!(bench.register(0x08e7), 0x18);
    assert_eq!(bench.subghz.borrow().tx_buffer, b"hello");
    // 3 s in 15.625 us steps
    assert_eq!(bench.last(0x83), Some(vec![0x83, 0x02, 0xee, 0x00]));
    assert_eq!(bench.timer.borrow().armed, vec![3000]);
    assert_eq!(bench.iv.last_switch(), Some(Switch::Tx { high_power: false }));
    assert_eq!(bench.radio.get_status(), RadioState::TxRunning);

    bench.subghz.borrow_mut().set_irq_status(0x0001);
    bench.radio.process_signal(IrqSignal::Dio1).await.unwrap();

    assert_eq!(bench.events(), vec![Event::TxDone]);
    assert_eq!(bench.last(0x02), Some(vec![0x02, 0x00, 0x01]));
    assert_eq!(bench.radio.get_status(), RadioState::Idle);
    assert_eq!(bench.timer.borrow().disarms, 1);
}

#[tokio::test]
async fn high_power_pa_above_15_dbm() {
    let mut bench = init_radio().await;
    bench
        .radio
        .set_tx_config(RadioModem::LoRa, 20, 0, 0, 7, 1, 8, false, true, false, 0, false, 3000)
        .await
        .unwrap();
    assert_eq!(bench.last(0x95), Some(vec![0x95, 0x04, 0x07, 0x00, 0x01]));
    assert_eq!(bench.last(0x8e), Some(vec![0x8e, 20, 0x02]));
    assert_eq!(bench.register(0x08e7), 0x38);

    bench.radio.send(&[0xaa]).await.unwrap();
    assert_eq!(bench.iv.last_switch(), Some(Switch::Tx { high_power: true }));
}

#[tokio::test]
async fn tx_timeout_reinitializes_radio() {
    let mut bench = init_radio().await;
    lora_tx(&mut bench, b"hello").await;
    bench.radio.process_signal(IrqSignal::Timeout).await.unwrap();

    assert_eq!(bench.events(), vec![Event::TxTimeout]);
    assert_eq!(bench.radio.get_status(), RadioState::Idle);
    assert_eq!(*bench.iv.resets.borrow(), 2);
    // Public syncword restored after the packet type was reloaded
    assert_eq!([bench.register(0x0740), bench.register(0x0741)], [0x34, 0x44]);

    bench.radio.set_channel(CHANNEL).await.unwrap();
    assert_eq!(bench.sent(0x98).len(), 2);
}

#[tokio::test]
async fn hardware_tx_timeout_reports_tx_timeout() {
    let mut bench = init_radio().await;
    lora_tx(&mut bench, b"hello").await;
    bench.subghz.borrow_mut().set_irq_status(0x0200);
    bench.radio.process_signal(IrqSignal::Dio1).await.unwrap();

    assert_eq!(bench.events(), vec![Event::TxTimeout]);
    assert_eq!(bench.radio.get_status(), RadioState::Idle);

    // A late software timeout finds nothing to do
    bench.radio.process_signal(IrqSignal::Timeout).await.unwrap();
    assert_eq!(bench.events(), vec![Event::TxTimeout]);
}

#[tokio::test]
async fn lora_single_reception() {
    let mut bench = init_radio().await;
    bench.subghz.borrow_mut().set_registers(0x0902, &[0x01]);
    lora_rx(&mut bench, false).await;

    assert_eq!(bench.last(0x82), Some(vec![0x82, 0x00, 0x00, 0x00]));
    assert_eq!(bench.last(0xa0), Some(vec![0xa0, 0x06]));
    assert_eq!(bench.register(0x08ac), 0x96);
    assert_eq!(bench.iv.last_switch(), Some(Switch::Rx));
    assert_eq!(bench.radio.get_status(), RadioState::RxRunning);

    {
        let mut subghz = bench.subghz.borrow_mut();
        subghz.load_rx(0x80, b"ping");
        subghz.respond(0x14, &[0xbc, 0x20, 0xc0]);
        subghz.set_irq_status(0x0002);
    }
    bench.radio.process_signal(IrqSignal::Dio1).await.unwrap();

    assert_eq!(bench.events(), vec![Event::RxDone(b"ping".to_vec(), -94, 0x20)]);
    assert_eq!(bench.last(0x1e), Some(vec![0x1e, 0x80, 0x00]));
    assert_eq!(bench.radio.get_status(), RadioState::Idle);
    assert_eq!(bench.radio.settings().lora_packet_handler.size, 4);
    // Implicit header timeout errata
    assert_eq!(bench.register(0x0902), 0x00);
    assert_eq!(bench.register(0x0944) & 0x02, 0x02);

    // The next reception starts from a clean slate
    bench.radio.receive().await.unwrap();
    assert_eq!(
        bench.radio.settings().lora_packet_handler,
        crate::settings::LoraRxState::default()
    );
}

#[tokio::test]
async fn lora_continuous_reception_keeps_receiving() {
    let mut bench = init_radio().await;
    bench.subghz.borrow_mut().set_registers(0x0902, &[0x01]);
    lora_rx(&mut bench, true).await;
    assert_eq!(bench.last(0x82), Some(vec![0x82, 0xff, 0xff, 0xff]));

    {
        let mut subghz = bench.subghz.borrow_mut();
        subghz.load_rx(0x00, &[1, 2, 3]);
        subghz.respond(0x14, &[0x80, 0xf8, 0x80]);
        subghz.set_irq_status(0x0002);
    }
    bench.radio.process_signal(IrqSignal::Dio1).await.unwrap();

    assert_eq!(bench.events(), vec![Event::RxDone(vec![1, 2, 3], -64, -8)]);
    assert_eq!(bench.radio.get_status(), RadioState::RxRunning);
    assert_eq!(bench.register(0x0902), 0x01);
}

#[tokio::test]
async fn lora_crc_error() {
    let mut bench = init_radio().await;
    lora_rx(&mut bench, false).await;
    bench.subghz.borrow_mut().set_irq_status(0x0042);
    bench.radio.process_signal(IrqSignal::Dio1).await.unwrap();

    assert_eq!(bench.events(), vec![Event::RxError]);
    assert!(bench.sent(0x1e).is_empty());
    assert_eq!(bench.radio.get_status(), RadioState::Idle);
}

#[tokio::test]
async fn rx_timeout_and_header_error() {
    for irq in [0x0200, 0x0020] {
        let mut bench = init_radio().await;
        lora_rx(&mut bench, false).await;
        bench.subghz.borrow_mut().set_irq_status(irq);
        bench.radio.process_signal(IrqSignal::Dio1).await.unwrap();
        assert_eq!(bench.events(), vec![Event::RxTimeout]);
        assert_eq!(bench.radio.get_status(), RadioState::Idle);
    }
}

#[tokio::test]
async fn preamble_alone_keeps_receiving() {
    let mut bench = init_radio().await;
    lora_rx(&mut bench, false).await;
    bench.subghz.borrow_mut().set_irq_status(0x0004);
    bench.radio.process_signal(IrqSignal::Dio1).await.unwrap();

    assert!(bench.events().is_empty());
    assert!(bench.radio.settings().fsk_packet_handler.preamble_detected);
    assert_eq!(bench.radio.get_status(), RadioState::RxRunning);
}

#[tokio::test]
async fn software_timeout_in_rx() {
    let mut bench = init_radio().await;
    lora_rx(&mut bench, false).await;
    bench.radio.process_signal(IrqSignal::Timeout).await.unwrap();

    assert_eq!(bench.events(), vec![Event::RxTimeout]);
    assert_eq!(bench.last(0x80), Some(vec![0x80, 0x00]));
    assert_eq!(bench.radio.get_status(), RadioState::Idle);
}

#[tokio::test]
async fn fsk_reception() {
    let mut bench = init_radio().await;
    fsk_rx_config(&mut bench).await;

    // 50 kbps, BT 1.0, 100 kHz double sided bandwidth
    assert_eq!(
        bench.last(0x8b),
        Some(vec![0x8b, 0x00, 0x50, 0x00, 0x0b, 0x13, 0x00, 0x00, 0x00])
    );
    assert_eq!(
        bench.last(0x8c),
        Some(vec![0x8c, 0x00, 0x28, 0x04, 0x18, 0x00, 0x01, 0xff, 0x06, 0x01])
    );
    assert_eq!(
        [bench.register(0x06c0), bench.register(0x06c1), bench.register(0x06c2)],
        [0xc1, 0x94, 0xc1]
    );
    assert_eq!([bench.register(0x06bc), bench.register(0x06bd)], [0x1d, 0x0f]);
    assert_eq!([bench.register(0x06be), bench.register(0x06bf)], [0x10, 0x21]);

    bench.radio.receive().await.unwrap();
    // 8 bytes at 50 kbps, 1 ms
    assert_eq!(bench.last(0x82), Some(vec![0x82, 0x00, 0x00, 0x40]));

    {
        let mut subghz = bench.subghz.borrow_mut();
        subghz.load_rx(0x00, b"fsk packet");
        subghz.respond(0x14, &[0x00, 0x80, 0x90]);
        subghz.set_irq_status(0x0002);
    }
    bench.radio.process_signal(IrqSignal::Dio1).await.unwrap();

    assert_eq!(bench.events(), vec![Event::RxDone(b"fsk packet".to_vec(), -64, 0)]);
    assert_eq!(bench.radio.settings().fsk_packet_handler.rssi_value, -64);
    assert_eq!(bench.radio.get_status(), RadioState::Idle);
}

#[tokio::test]
async fn fsk_transmission() {
    let mut bench = init_radio().await;
    bench
        .radio
        .set_tx_config(RadioModem::Fsk, 10, 25_000, 50_000, 50_000, 0, 5, false, true, false, 0, false, 2000)
        .await
        .unwrap();
    assert_eq!(
        bench.last(0x8b),
        Some(vec![0x8b, 0x00, 0x50, 0x00, 0x0b, 0x13, 0x00, 0x66, 0x66])
    );
    assert_eq!(bench.last(0x8e), Some(vec![0x8e, 10, 0x02]));

    let payload: Vec<u8> = (0..100).collect();
    bench.radio.send(&payload).await.unwrap();
    assert_eq!(
        bench.last(0x8c),
        Some(vec![0x8c, 0x00, 0x28, 0x04, 0x18, 0x00, 0x01, 100, 0x06, 0x01])
    );
    assert_eq!(bench.subghz.borrow().tx_buffer, payload);
    assert_eq!(bench.last(0x83), Some(vec![0x83, 0x01, 0xf4, 0x00]));
    assert_eq!(bench.radio.time_on_air(RadioModem::Fsk, 10).await, Ok(4));
}

#[tokio::test]
async fn invalid_configurations_are_rejected() {
    let mut bench = init_radio().await;
    let cases: [(RadioModem, u32, u32, u8, ConfigError); 5] = [
        (RadioModem::LoRa, 3, 7, 1, ConfigError::LoRaBandwidth(3)),
        (RadioModem::LoRa, 0, 13, 1, ConfigError::SpreadingFactor(13)),
        (RadioModem::LoRa, 0, 7, 5, ConfigError::CodingRate(5)),
        (RadioModem::Fsk, 250_000, 50_000, 0, ConfigError::FskBandwidth(250_000)),
        (RadioModem::Fsk, 50_000, 0, 0, ConfigError::Datarate(0)),
    ];
    for (modem, bandwidth, datarate, coderate, expected) in cases {
        let result = bench
            .radio
            .set_rx_config(
                modem, bandwidth, datarate, coderate, 83_333, 8, 5, false, 0, true, false, 0, false, false,
            )
            .await;
        assert_eq!(result, Err(RadioError::Configuration(expected)));
    }
    assert_eq!(bench.radio.settings().lora, LoraParams::default());
    assert!(bench.sent(0x8b).is_empty());
}

#[tokio::test]
async fn command_error_status_is_reported() {
    let mut bench = init_radio().await;
    // Command execution failure
    bench.subghz.borrow_mut().status = 0x2a;
    let result = bench.radio.set_public_network(true).await;
    assert_eq!(result, Err(RadioError::OpError(0x2a)));
}

#[tokio::test]
async fn modem_switch_restores_syncword() {
    let mut bench = init_radio().await;
    bench.radio.set_public_network(true).await.unwrap();
    assert_eq!([bench.register(0x0740), bench.register(0x0741)], [0x34, 0x44]);

    fsk_rx_config(&mut bench).await;
    lora_rx(&mut bench, false).await;

    assert_eq!(bench.sent(0x8a), vec![vec![0x8a, 0x01], vec![0x8a, 0x00], vec![0x8a, 0x01]]);
    assert_eq!([bench.register(0x0740), bench.register(0x0741)], [0x34, 0x44]);
}

#[tokio::test]
async fn cad_reports_activity() {
    let mut bench = init_radio().await;
    lora_rx(&mut bench, false).await;
    bench.radio.standby().await.unwrap();
    bench.radio.start_cad().await.unwrap();

    assert_eq!(
        bench.last(0x88),
        Some(vec![0x88, 0x03, 20, 10, 0x00, 0x00, 0x00, 0x00])
    );
    assert_eq!(bench.last(0xc5), Some(vec![0xc5]));
    assert_eq!(bench.radio.get_status(), RadioState::Cad);

    bench.subghz.borrow_mut().set_irq_status(0x0180);
    bench.radio.process_signal(IrqSignal::Dio1).await.unwrap();
    assert_eq!(bench.events(), vec![Event::CadDone(true)]);
    assert_eq!(bench.radio.get_status(), RadioState::Idle);
}

#[tokio::test]
async fn sleep_then_wake_on_next_command() {
    let mut bench = init_radio().await;
    bench.clear_commands();
    bench.radio.sleep().await.unwrap();
    bench.radio.standby().await.unwrap();

    // Warm start
    assert_eq!(
        bench.subghz.borrow().commands,
        vec![vec![0x84, 0x04], vec![0xc0, 0x00], vec![0x80, 0x00]]
    );
}

#[tokio::test]
async fn random_reads_rng_with_lna_off() {
    let mut bench = init_radio().await;
    {
        let mut subghz = bench.subghz.borrow_mut();
        subghz.set_registers(0x08e2, &[0x41]);
        subghz.set_registers(0x08e5, &[0x83]);
        subghz.set_registers(0x0819, &[0xde, 0xad, 0xbe, 0xef]);
    }
    assert_eq!(bench.radio.random().await, Ok(0xdead_beef));

    let writes = bench.sent(0x0d);
    assert!(writes.contains(&vec![0x0d, 0x08, 0xe2, 0x40]));
    assert!(writes.contains(&vec![0x0d, 0x08, 0xe5, 0x03]));
    assert_eq!(bench.register(0x08e2), 0x41);
    assert_eq!(bench.register(0x08e5), 0x83);
    assert_eq!(bench.last(0x82), Some(vec![0x82, 0xff, 0xff, 0xff]));
    assert_eq!(bench.subghz.borrow().commands.last(), Some(&vec![0x84, 0x04]));
}

#[tokio::test]
async fn carrier_sense() {
    let mut bench = init_radio().await;
    // -104 dBm
    bench.subghz.borrow_mut().respond(0x15, &[0xd0]);
    let clear = bench
        .radio
        .perform_carrier_sense(RadioModem::LoRa, CHANNEL, -90, 5)
        .await
        .unwrap();
    assert!(clear);
    assert!(!bench.sent(0x15).is_empty());

    // -80 dBm
    bench.subghz.borrow_mut().respond(0x15, &[0xa0]);
    let reads = bench.sent(0x15).len();
    let clear = bench
        .radio
        .perform_carrier_sense(RadioModem::LoRa, CHANNEL, -90, 5)
        .await
        .unwrap();
    assert!(!clear);
    assert_eq!(bench.sent(0x15).len(), reads + 1);
    assert_eq!(bench.subghz.borrow().commands.last(), Some(&vec![0x84, 0x04]));
}

#[tokio::test]
async fn continuous_wave_on_high_power_pa() {
    let mut bench = init_radio().await;
    bench.radio.set_tx_continuous_wave(CHANNEL, 20, 5).await.unwrap();

    assert_eq!(bench.last(0x95), Some(vec![0x95, 0x04, 0x07, 0x00, 0x01]));
    assert_eq!(bench.last(0xd1), Some(vec![0xd1]));
    assert_eq!(bench.timer.borrow().armed, vec![5000]);
    assert_eq!(bench.iv.last_switch(), Some(Switch::Tx { high_power: true }));
    assert_eq!(bench.radio.get_status(), RadioState::TxRunning);

    bench.radio.process_signal(IrqSignal::Timeout).await.unwrap();
    assert_eq!(bench.events(), vec![Event::TxTimeout]);
}

#[tokio::test]
async fn max_payload_length_updates_packet_params() {
    let mut bench = init_radio().await;
    lora_rx(&mut bench, false).await;
    bench.radio.set_max_payload_length(RadioModem::LoRa, 64).await.unwrap();
    assert_eq!(
        bench.last(0x8c),
        Some(vec![0x8c, 0x00, 0x08, 0x00, 0x40, 0x01, 0x00])
    );
}

#[tokio::test]
async fn frequency_range_and_time_on_air() {
    let mut bench = init_radio().await;
    assert!(bench.radio.check_rf_frequency(150_000_000));
    assert!(bench.radio.check_rf_frequency(960_000_000));
    assert!(!bench.radio.check_rf_frequency(149_999_999));
    assert!(!bench.radio.check_rf_frequency(1_000_000_000));

    lora_rx(&mut bench, false).await;
    assert_eq!(bench.radio.time_on_air(RadioModem::LoRa, 1).await, Ok(27));
}
