use fixtures::{init_radio, init_radio_with, Bench, Event};

use crate::mod_params::*;
use crate::mod_traits::LoRaRadio;
use crate::settings::LoraRxState;

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
    bench.radio.set_channel(CHANNEL).await.unwrap();
    bench
        .radio
        .set_tx_config(RadioModem::LoRa, 14, 0, 0, 7, 1, 8, false, true, false, 0, false, 3000)
        .await
        .unwrap();
    bench.radio.send(payload).await.unwrap();
}

async fn fsk_rx_config(bench: &mut Bench, symb_timeout: u16, rx_continuous: bool) {
    bench.radio.set_channel(CHANNEL).await.unwrap();
    bench
        .radio
        .set_rx_config(
            RadioModem::Fsk,
            50_000,
            50_000,
            0,
            83_333,
            5,
            symb_timeout,
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
}

async fn lora_rx_config(bench: &mut Bench, bandwidth: u32, sf: u32) {
    bench
        .radio
        .set_rx_config(RadioModem::LoRa, bandwidth, sf, 1, 0, 8, 5, false, 0, true, false, 0, false, false)
        .await
        .unwrap();
}

#[tokio::test]
async fn init_loads_power_on_registers() {
    let bench = init_radio().await;
    let chip = bench.chip.borrow();
    assert_eq!(chip.fsk(0x0c), 0x23);
    assert_eq!(chip.fsk(0x30), 0xd8);
    assert_eq!(chip.fsk(0x41), 0x30);
    assert_eq!(chip.lora(0x23), 0x40);
    // FSK modem, sleep
    assert_eq!(chip.fsk(0x01), 0x00);
    assert_eq!(bench.radio.get_status(), RadioState::Idle);
    assert_eq!(bench.radio.settings().modem, RadioModem::Fsk);
}

#[tokio::test]
async fn lora_single_reception() {
    let mut bench = init_radio().await;
    lora_rx(&mut bench, false).await;
    assert_eq!(bench.radio.get_status(), RadioState::RxRunning);
    assert_eq!(bench.op_mode(), 0x06);

    {
        let mut chip = bench.chip.borrow_mut();
        chip.set_lora(0x12, 0x40);
        chip.set_lora(0x19, 0x20);
        chip.set_lora(0x1a, 60);
        chip.set_lora(0x13, 10);
        chip.set_lora(0x10, 0x00);
        chip.rx_fifo.extend(0..10u8);
    }
    bench.radio.process_signal(IrqSignal::Dio0).await.unwrap();

    // -157 + 60 + 60 / 16
    assert_eq!(bench.events(), vec![Event::RxDone((0..10).collect(), -94, 0x20)]);
    assert_eq!(bench.radio.get_status(), RadioState::Idle);
    assert_eq!(bench.chip.borrow().lora(0x12), 0x00);
}

#[tokio::test]
async fn lora_crc_error_single() {
    let mut bench = init_radio().await;
    lora_rx(&mut bench, false).await;
    bench.chip.borrow_mut().set_lora(0x12, 0x60);
    bench.radio.process_signal(IrqSignal::Dio0).await.unwrap();

    assert_eq!(bench.events(), vec![Event::RxError]);
    assert_eq!(bench.radio.get_status(), RadioState::Idle);
    assert_eq!(bench.chip.borrow().lora(0x12), 0x00);
}

#[tokio::test]
async fn lora_crc_error_continuous_keeps_receiving() {
    let mut bench = init_radio().await;
    lora_rx(&mut bench, true).await;
    assert_eq!(bench.op_mode(), 0x05);
    bench.chip.borrow_mut().set_lora(0x12, 0x60);
    bench.radio.process_signal(IrqSignal::Dio0).await.unwrap();

    assert_eq!(bench.events(), vec![Event::RxError]);
    assert_eq!(bench.radio.get_status(), RadioState::RxRunning);
}

#[tokio::test]
async fn lora_rx_timeout() {
    let mut bench = init_radio().await;
    lora_rx(&mut bench, false).await;
    bench.chip.borrow_mut().set_lora(0x12, 0x80);
    bench.radio.process_signal(IrqSignal::Dio1).await.unwrap();

    assert_eq!(bench.events(), vec![Event::RxTimeout]);
    assert_eq!(bench.radio.get_status(), RadioState::Idle);
    assert_eq!(bench.chip.borrow().lora(0x12), 0x00);
}

#[tokio::test]
async fn lora_tx_done() {
    let mut bench = init_radio().await;
    lora_tx(&mut bench, &[1, 2, 3]).await;

    assert_eq!(bench.radio.get_status(), RadioState::TxRunning);
    assert_eq!(bench.timer.borrow().armed, vec![3000]);
    assert_eq!(bench.op_mode(), 0x03);
    {
        let chip = bench.chip.borrow();
        assert_eq!(chip.tx_fifo, vec![1, 2, 3]);
        assert_eq!(chip.lora(0x22), 3);
        // RFO, 14 dBm
        assert_eq!(chip.fsk(0x09), 0x7f);
    }

    let disarms = bench.disarms();
    bench.chip.borrow_mut().set_lora(0x12, 0x08);
    bench.radio.process_signal(IrqSignal::Dio0).await.unwrap();

    assert_eq!(bench.events(), vec![Event::TxDone]);
    assert_eq!(bench.radio.get_status(), RadioState::Idle);
    assert_eq!(bench.disarms(), disarms + 1);
    assert_eq!(bench.chip.borrow().lora(0x12), 0x00);
}

#[tokio::test]
async fn tx_timeout_reinitializes_radio() {
    let mut bench = init_radio().await;
    bench.radio.set_public_network(true).await.unwrap();
    lora_tx(&mut bench, &[0xaa; 16]).await;
    {
        let mut chip = bench.chip.borrow_mut();
        chip.set_lora(0x39, 0x00);
        chip.set_lora(0x23, 0x00);
    }

    let disarms = bench.disarms();
    bench.radio.process_signal(IrqSignal::Timeout).await.unwrap();

    assert_eq!(bench.events(), vec![Event::TxTimeout]);
    assert_eq!(bench.disarms(), disarms + 1);
    assert_eq!(bench.radio.get_status(), RadioState::Idle);
    let chip = bench.chip.borrow();
    assert_eq!(chip.lora(0x39), 0x34);
    assert_eq!(chip.lora(0x23), 0x40);
}

#[tokio::test]
async fn fsk_reception_through_fifo_level() {
    let mut bench = init_radio().await;
    bench.radio.set_channel(CHANNEL).await.unwrap();
    bench
        .radio
        .set_rx_config(
            RadioModem::Fsk,
            50_000,
            50_000,
            0,
            83_333,
            5,
            0,
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
    {
        let chip = bench.chip.borrow();
        assert_eq!(chip.fsk(0x12), 0x0b);
        assert_eq!(chip.fsk(0x13), 0x12);
        // 32 MHz / 50 kbps = 640
        assert_eq!((chip.fsk(0x02), chip.fsk(0x03)), (0x02, 0x80));
    }

    bench.radio.receive().await.unwrap();
    {
        let mut chip = bench.chip.borrow_mut();
        chip.rx_fifo.push_back(20);
        chip.rx_fifo.extend(0..20u8);
        chip.set_fsk(0x3f, 0x02);
        chip.set_fsk(0x11, 0x80);
    }

    bench.radio.process_signal(IrqSignal::Dio4).await.unwrap();
    assert!(bench.radio.settings().fsk_packet_handler.preamble_detected);

    // FIFO threshold of 15 bytes from the power-on configuration
    bench.radio.process_signal(IrqSignal::Dio1).await.unwrap();
    assert_eq!(bench.radio.settings().fsk_packet_handler.nb_bytes, 15);

    bench.radio.process_signal(IrqSignal::Dio0).await.unwrap();
    assert_eq!(bench.events(), vec![Event::RxDone((0..20).collect(), -64, 0)]);
    assert_eq!(bench.radio.get_status(), RadioState::Idle);
    assert_eq!(bench.radio.settings().fsk_packet_handler.nb_bytes, 0);
}

#[tokio::test]
async fn fsk_crc_error_clears_flags() {
    let mut bench = init_radio().await;
    bench
        .radio
        .set_rx_config(
            RadioModem::Fsk,
            50_000,
            50_000,
            0,
            83_333,
            5,
            0,
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
    bench.radio.receive().await.unwrap();
    {
        let mut chip = bench.chip.borrow_mut();
        chip.set_fsk(0x3e, 0x0b);
        chip.set_fsk(0x3f, 0x10);
    }
    bench.radio.process_signal(IrqSignal::Dio0).await.unwrap();

    assert_eq!(bench.events(), vec![Event::RxError]);
    assert_eq!(bench.radio.get_status(), RadioState::Idle);
    let chip = bench.chip.borrow();
    assert_eq!((chip.fsk(0x3e), chip.fsk(0x3f)), (0x00, 0x00));
}

#[tokio::test]
async fn fsk_transmission_is_streamed_in_chunks() {
    let mut bench = init_radio().await;
    bench
        .radio
        .set_tx_config(RadioModem::Fsk, 10, 25_000, 0, 50_000, 0, 5, false, true, false, 0, false, 2000)
        .await
        .unwrap();
    let payload: Vec<u8> = (0..100).collect();
    bench.radio.send(&payload).await.unwrap();
    // Length byte + first chunk
    assert_eq!(bench.chip.borrow().tx_fifo.len(), 33);

    for _ in 0..4 {
        bench.radio.process_signal(IrqSignal::Dio1).await.unwrap();
    }
    assert_eq!(bench.chip.borrow().tx_fifo[0], 100);
    assert_eq!(bench.chip.borrow().tx_fifo[1..], payload[..]);

    bench.radio.process_signal(IrqSignal::Dio0).await.unwrap();
    assert_eq!(bench.events(), vec![Event::TxDone]);
}

#[tokio::test]
async fn receive_resets_reception_state() {
    let mut bench = init_radio().await;
    bench
        .radio
        .set_rx_config(
            RadioModem::Fsk,
            50_000,
            50_000,
            0,
            83_333,
            5,
            0,
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
    bench.radio.settings.fsk_packet_handler.nb_bytes = 7;
    bench.radio.settings.fsk_packet_handler.size = 9;
    bench.radio.settings.fsk_packet_handler.preamble_detected = true;
    bench.radio.settings.lora_packet_handler.size = 9;
    bench.radio.settings.lora_packet_handler.snr_value = -12;
    bench.radio.data_buffer[0] = 0xaa;

    bench.radio.receive().await.unwrap();

    let handler = bench.radio.settings().fsk_packet_handler;
    assert_eq!((handler.nb_bytes, handler.size), (0, 0));
    assert!(!handler.preamble_detected);
    assert_eq!(bench.radio.settings().lora_packet_handler, LoraRxState::default());
    assert!(bench.radio.data_buffer.iter().all(|b| *b == 0));
}

#[tokio::test]
async fn frequency_hopping_reports_channel() {
    let mut bench = init_radio().await;
    bench
        .radio
        .set_rx_config(RadioModem::LoRa, 0, 7, 1, 0, 8, 5, false, 0, true, true, 4, false, true)
        .await
        .unwrap();
    bench.radio.receive().await.unwrap();
    assert_eq!(bench.chip.borrow().fsk(0x44) & 0x80, 0x80);
    assert_eq!(bench.chip.borrow().lora(0x24), 4);

    {
        let mut chip = bench.chip.borrow_mut();
        chip.set_lora(0x12, 0x02);
        chip.set_lora(0x1c, 0x45);
    }
    bench.radio.process_signal(IrqSignal::Dio2).await.unwrap();
    assert_eq!(bench.events(), vec![Event::FhssChangeChannel(0x05)]);
    assert_eq!(bench.chip.borrow().lora(0x12), 0x00);
}

#[tokio::test]
async fn cad_reports_activity() {
    let mut bench = init_radio().await;
    lora_rx(&mut bench, false).await;
    bench.radio.standby().await.unwrap();

    bench.radio.start_cad().await.unwrap();
    assert_eq!(bench.radio.get_status(), RadioState::Cad);
    assert_eq!(bench.op_mode(), 0x07);

    bench.chip.borrow_mut().set_lora(0x12, 0x05);
    bench.radio.process_signal(IrqSignal::Dio3).await.unwrap();
    assert_eq!(bench.radio.get_status(), RadioState::Idle);
    assert_eq!(bench.chip.borrow().lora(0x12), 0x00);

    bench.radio.start_cad().await.unwrap();
    bench.chip.borrow_mut().set_lora(0x12, 0x04);
    bench.radio.process_signal(IrqSignal::Dio3).await.unwrap();

    assert_eq!(bench.events(), vec![Event::CadDone(true), Event::CadDone(false)]);
}

#[tokio::test]
async fn carrier_sense_clear_channel() {
    let mut bench = init_radio().await;
    // -157 + 62 = -95 dBm
    bench.chip.borrow_mut().set_lora(0x1b, 62);

    let clear = bench
        .radio
        .perform_carrier_sense(RadioModem::LoRa, CHANNEL, -90, 50)
        .await
        .unwrap();
    assert!(clear);
    assert_eq!(bench.op_mode(), 0x00);
    assert_eq!(bench.radio.get_status(), RadioState::Idle);
}

#[tokio::test]
async fn carrier_sense_stops_on_busy_channel() {
    let mut bench = init_radio().await;
    {
        let mut chip = bench.chip.borrow_mut();
        chip.set_lora(0x1b, 62);
        // -80 dBm on the third sample
        chip.script(0x1b, [62, 62, 77]);
        chip.reads.clear();
    }

    let clear = bench
        .radio
        .perform_carrier_sense(RadioModem::LoRa, CHANNEL, -90, 50)
        .await
        .unwrap();
    assert!(!clear);
    let chip = bench.chip.borrow();
    assert_eq!(chip.reads.iter().filter(|addr| **addr == 0x1b).count(), 3);
    assert_eq!(chip.fsk(0x01) & 0x07, 0x00);
}

#[tokio::test]
async fn random_collects_wideband_rssi_lsb() {
    let mut bench = init_radio().await;
    bench
        .chip
        .borrow_mut()
        .script(0x2c, (0..32).map(|i| 0x50 | (i % 2 == 0) as u8));

    assert_eq!(bench.radio.random().await.unwrap(), 0x5555_5555);
    assert_eq!(bench.op_mode(), 0x00);
    assert_eq!(bench.chip.borrow().lora(0x11), 0xff);
}

#[tokio::test]
async fn continuous_wave_arms_timer_in_ms() {
    let mut bench = init_radio().await;
    bench.radio.set_tx_continuous_wave(CHANNEL, 10, 5).await.unwrap();

    assert_eq!(bench.radio.get_status(), RadioState::TxRunning);
    assert_eq!(bench.timer.borrow().armed.last(), Some(&5000));
    let chip = bench.chip.borrow();
    assert_eq!(chip.fsk(0x31) & 0x40, 0x00);
    assert_eq!(chip.fsk(0x01) & 0x07, 0x03);
}

#[tokio::test]
async fn invalid_configurations_are_rejected() {
    let mut bench = init_radio().await;
    let cases: [(RadioModem, u32, u32, u8, ConfigError); 5] = [
        (RadioModem::LoRa, 3, 7, 1, ConfigError::LoRaBandwidth(3)),
        (RadioModem::LoRa, 0, 7, 5, ConfigError::CodingRate(5)),
        (RadioModem::Fsk, 300_000, 50_000, 0, ConfigError::FskBandwidth(300_000)),
        (RadioModem::Fsk, 50_000, 0, 0, ConfigError::Datarate(0)),
        // 32 MHz / 300 bps does not fit the 16 bit bit rate register
        (RadioModem::Fsk, 50_000, 300, 0, ConfigError::Datarate(300)),
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
}

#[tokio::test]
async fn modem_switch_restores_dio_defaults() {
    let mut bench = init_radio().await;
    bench.radio.set_public_network(false).await.unwrap();
    {
        let chip = bench.chip.borrow();
        assert_eq!(chip.fsk(0x01) & 0x80, 0x80);
        assert_eq!(chip.fsk(0x41), 0x00);
        assert_eq!(chip.lora(0x39), 0x12);
    }
    bench.radio.set_max_payload_length(RadioModem::Fsk, 64).await.unwrap();
    let chip = bench.chip.borrow();
    assert_eq!(chip.fsk(0x01) & 0x80, 0x00);
    assert_eq!(chip.fsk(0x41), 0x30);
    assert_eq!(chip.fsk(0x32), 64);
}

#[tokio::test]
async fn time_on_air_and_frequency_range() {
    let mut bench = init_radio().await;
    lora_tx(&mut bench, &[0]).await;
    assert_eq!(bench.radio.time_on_air(RadioModem::LoRa, 1).await.unwrap(), 27);

    assert!(bench.radio.check_rf_frequency(CHANNEL));
    assert!(bench.radio.check_rf_frequency(137_000_000));
    assert!(!bench.radio.check_rf_frequency(136_999_999));
    assert!(!bench.radio.check_rf_frequency(1_020_000_001));
}

#[tokio::test]
async fn init_calibrates_image_at_both_bands() {
    let bench = init_radio_with(|chip| {
        // Reset values: 434 MHz, RFO at 13 dBm
        chip.set_fsk(0x06, 0x6c);
        chip.set_fsk(0x07, 0x80);
        chip.set_fsk(0x08, 0x00);
        chip.set_fsk(0x09, 0x4f);
        chip.set_fsk(0x3b, 0x82);
    })
    .await;

    let chip = bench.chip.borrow();
    assert_eq!(
        chip.writes[..10],
        [
            // PA off
            (0x09, 0x00),
            (0x3b, 0xc2),
            // 868 MHz
            (0x06, 0xd9),
            (0x07, 0x00),
            (0x08, 0x00),
            (0x3b, 0xc2),
            // PA and channel restored
            (0x09, 0x4f),
            (0x06, 0x6c),
            (0x07, 0x80),
            (0x08, 0x00),
        ]
    );
    assert_eq!(chip.fsk(0x09), 0x4f);
    assert_eq!(bench.radio.settings().channel, 434_000_000);
}

#[tokio::test]
async fn low_datarate_optimize_bit() {
    let mut bench = init_radio().await;
    bench.radio.set_channel(CHANNEL).await.unwrap();
    let cases = [
        (0, 10, false),
        (0, 11, true),
        (0, 12, true),
        (1, 11, false),
        (1, 12, true),
        (2, 12, false),
    ];
    for (bandwidth, sf, ldro) in cases {
        lora_rx_config(&mut bench, bandwidth, sf).await;
        let modem_config3 = bench.chip.borrow().lora(0x26);
        assert_eq!(modem_config3 & 0x08 == 0x08, ldro, "bw {} sf {}", bandwidth, sf);
    }
}

#[tokio::test]
async fn sf6_detection_settings() {
    let mut bench = init_radio().await;
    bench.radio.set_channel(CHANNEL).await.unwrap();
    for (sf, detect_optimize, detection_threshold) in [(6, 0x05, 0x0c), (7, 0x03, 0x0a), (6, 0x05, 0x0c)] {
        lora_rx_config(&mut bench, 0, sf).await;
        let chip = bench.chip.borrow();
        assert_eq!(chip.lora(0x31) & 0x07, detect_optimize, "sf {}", sf);
        assert_eq!(chip.lora(0x37), detection_threshold, "sf {}", sf);
    }
}

#[tokio::test]
async fn wide_bandwidth_errata_depends_on_band() {
    let mut bench = init_radio().await;
    for (channel, test36, test3a) in [(CHANNEL, 0x02, 0x64), (433_175_000, 0x02, 0x7f)] {
        bench.radio.set_channel(channel).await.unwrap();
        lora_rx_config(&mut bench, 2, 7).await;
        let chip = bench.chip.borrow();
        assert_eq!((chip.lora(0x36), chip.lora(0x3a)), (test36, test3a), "{} Hz", channel);
    }

    lora_rx_config(&mut bench, 0, 7).await;
    assert_eq!(bench.chip.borrow().lora(0x36), 0x03);
}

#[tokio::test]
async fn fsk_single_reception_times_out_on_dio2() {
    let mut bench = init_radio().await;
    fsk_rx_config(&mut bench, 9, false).await;
    bench.radio.receive().await.unwrap();
    {
        let mut chip = bench.chip.borrow_mut();
        // DIO2 carries TimeOut, not SyncAddress
        assert_eq!(chip.fsk(0x40) & 0x0c, 0x08);
        assert_eq!(chip.fsk(0x21), 5);
        chip.set_fsk(0x3e, 0x04 | 0x02);
    }

    bench.radio.process_signal(IrqSignal::Dio2).await.unwrap();

    assert_eq!(bench.events(), vec![Event::RxTimeout]);
    assert_eq!(bench.radio.get_status(), RadioState::Idle);
    assert_eq!(bench.chip.borrow().fsk(0x3e), 0x00);
}

#[tokio::test]
async fn fsk_continuous_reception_restarts_receiver() {
    let mut bench = init_radio().await;
    fsk_rx_config(&mut bench, 0, true).await;
    bench.radio.receive().await.unwrap();
    {
        let mut chip = bench.chip.borrow_mut();
        assert_eq!(chip.fsk(0x21), 0);
        chip.rx_fifo.push_back(3);
        chip.rx_fifo.extend([1, 2, 3]);
        chip.set_fsk(0x3f, 0x02);
        chip.set_fsk(0x11, 0x80);
    }

    bench.radio.process_signal(IrqSignal::Dio0).await.unwrap();
    assert_eq!(bench.radio.get_status(), RadioState::RxRunning);
    assert_eq!(bench.chip.borrow().fsk(0x0d), 0x5e);

    {
        let mut chip = bench.chip.borrow_mut();
        // RestartRxWithoutPllLock clears itself on the chip
        chip.set_fsk(0x0d, 0x1e);
        chip.set_fsk(0x3f, 0x00);
    }
    bench.radio.process_signal(IrqSignal::Dio0).await.unwrap();
    assert_eq!(bench.radio.get_status(), RadioState::RxRunning);
    assert_eq!(bench.chip.borrow().fsk(0x0d), 0x5e);

    assert_eq!(bench.events(), vec![Event::RxDone(vec![1, 2, 3], -64, 0), Event::RxError]);
}
