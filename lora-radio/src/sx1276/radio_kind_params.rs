use crate::mod_params::FskBandwidth;

/// Register address with the SPI direction bit applied
pub trait RegisterAddr: Copy {
    fn addr(self) -> u8;

    fn read_addr(self) -> u8 {
        self.addr() & 0x7f
    }
    fn write_addr(self) -> u8 {
        self.addr() | 0x80
    }
}

// Registers whose meaning does not depend on the selected modem
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[allow(dead_code)]
pub enum Register {
    Fifo = 0x00,
    OpMode = 0x01,
    FrfMsb = 0x06,
    FrfMid = 0x07,
    FrfLsb = 0x08,
    PaConfig = 0x09,
    PaRamp = 0x0a,
    Ocp = 0x0b,
    Lna = 0x0c,
    DioMapping1 = 0x40,
    DioMapping2 = 0x41,
    Version = 0x42,
    PllHop = 0x44,
    Tcxo = 0x4b,
    PaDac = 0x4d,
}

// FSK/OOK page
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[allow(dead_code)]
pub enum FskRegister {
    BitrateMsb = 0x02,
    BitrateLsb = 0x03,
    FdevMsb = 0x04,
    FdevLsb = 0x05,
    RxConfig = 0x0d,
    RssiConfig = 0x0e,
    RssiValue = 0x11,
    RxBw = 0x12,
    AfcBw = 0x13,
    AfcFei = 0x1a,
    AfcMsb = 0x1b,
    AfcLsb = 0x1c,
    PreambleDetect = 0x1f,
    RxTimeout1 = 0x20,
    RxTimeout2 = 0x21,
    RxTimeout3 = 0x22,
    Osc = 0x24,
    PreambleMsb = 0x25,
    PreambleLsb = 0x26,
    SyncConfig = 0x27,
    SyncValue1 = 0x28,
    SyncValue2 = 0x29,
    SyncValue3 = 0x2a,
    PacketConfig1 = 0x30,
    PacketConfig2 = 0x31,
    PayloadLength = 0x32,
    FifoThresh = 0x35,
    ImageCal = 0x3b,
    IrqFlags1 = 0x3e,
    IrqFlags2 = 0x3f,
}

// LoRa page
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[allow(dead_code)]
pub enum LoRaRegister {
    FifoAddrPtr = 0x0d,
    FifoTxBaseAddr = 0x0e,
    FifoRxBaseAddr = 0x0f,
    FifoRxCurrentAddr = 0x10,
    IrqFlagsMask = 0x11,
    IrqFlags = 0x12,
    RxNbBytes = 0x13,
    PktSnrValue = 0x19,
    PktRssiValue = 0x1a,
    RssiValue = 0x1b,
    HopChannel = 0x1c,
    ModemConfig1 = 0x1d,
    ModemConfig2 = 0x1e,
    SymbTimeoutLsb = 0x1f,
    PreambleMsb = 0x20,
    PreambleLsb = 0x21,
    PayloadLength = 0x22,
    PayloadMaxLength = 0x23,
    HopPeriod = 0x24,
    ModemConfig3 = 0x26,
    RssiWideband = 0x2c,
    Test2F = 0x2f,
    Test30 = 0x30,
    DetectOptimize = 0x31,
    InvertIq = 0x33,
    Test36 = 0x36,
    DetectionThreshold = 0x37,
    SyncWord = 0x39,
    Test3A = 0x3a,
    InvertIq2 = 0x3b,
}

impl RegisterAddr for Register {
    fn addr(self) -> u8 {
        self as u8
    }
}

impl RegisterAddr for FskRegister {
    fn addr(self) -> u8 {
        self as u8
    }
}

impl RegisterAddr for LoRaRegister {
    fn addr(self) -> u8 {
        self as u8
    }
}

/// RegOpMode[2:0]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum OpMode {
    Sleep = 0x00,
    Standby = 0x01,
    Transmitter = 0x03,
    Receiver = 0x05,
    ReceiverSingle = 0x06,
    Cad = 0x07,
}

impl OpMode {
    pub const MASK: u8 = 0xf8;

    pub fn value(self) -> u8 {
        self as u8
    }
}

// RegOpMode[7]
pub const LONG_RANGE_MODE_MASK: u8 = 0x7f;
pub const LONG_RANGE_MODE_ON: u8 = 0x80;

/// RegIrqFlags / RegIrqFlagsMask bits (LoRa)
#[derive(Clone, Copy)]
#[allow(dead_code)]
pub enum IrqMask {
    CadDetected = 0x01,
    FhssChangedChannel = 0x02,
    CadDone = 0x04,
    TxDone = 0x08,
    ValidHeader = 0x10,
    CrcError = 0x20,
    RxDone = 0x40,
    RxTimeout = 0x80,
}

impl IrqMask {
    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn is_set_in(self, flags: u8) -> bool {
        self.value() & flags == self.value()
    }
}

// RegIrqFlags1 (FSK)
pub const FSK_IRQ1_SYNCADDRESSMATCH: u8 = 0x01;
pub const FSK_IRQ1_PREAMBLEDETECT: u8 = 0x02;
pub const FSK_IRQ1_TIMEOUT: u8 = 0x04;
pub const FSK_IRQ1_RSSI: u8 = 0x08;
// RegIrqFlags2 (FSK)
pub const FSK_IRQ2_CRCOK: u8 = 0x02;
pub const FSK_IRQ2_FIFOOVERRUN: u8 = 0x10;

// RegDioMapping1
pub const DIO0_MASK: u8 = 0x3f;
pub const DIO0_00: u8 = 0x00;
pub const DIO0_01: u8 = 0x40;
pub const DIO0_11: u8 = 0xc0;
pub const DIO1_MASK: u8 = 0xcf;
pub const DIO1_00: u8 = 0x00;
pub const DIO1_01: u8 = 0x10;
pub const DIO1_11: u8 = 0x30;
pub const DIO2_MASK: u8 = 0xf3;
pub const DIO2_00: u8 = 0x00;
pub const DIO2_10: u8 = 0x08;
pub const DIO3_MASK: u8 = 0xfc;
pub const DIO3_00: u8 = 0x00;
// RegDioMapping2
pub const DIO4_MASK: u8 = 0x3f;
pub const DIO4_10: u8 = 0x80;
pub const DIO4_11: u8 = 0xc0;
pub const DIO5_10: u8 = 0x20;
pub const MAP_MASK: u8 = 0xfe;
pub const MAP_PREAMBLEDETECT: u8 = 0x01;

// Default DIO mapping per modem, (RegDioMapping1, RegDioMapping2)
pub const FSK_DIO_DEFAULTS: (u8, u8) = (0x00, 0x30);
pub const LORA_DIO_DEFAULTS: (u8, u8) = (0x00, 0x00);

// RegRxConfig (FSK)
pub const RX_CONFIG_AFCAUTO_AGCAUTO_TRIG_PREAMBLE: u8 = 0x1e;
pub const RX_CONFIG_RESTART_RX_WITHOUT_PLL_LOCK: u8 = 0x40;

// RegPacketConfig1 (FSK)
pub const PACKET_CONFIG1_FORMAT_MASK: u8 = 0x7f;
pub const PACKET_CONFIG1_FORMAT_VARIABLE: u8 = 0x80;
pub const PACKET_CONFIG1_CRC_MASK: u8 = 0xef;
pub const PACKET_CONFIG1_CRC_ON: u8 = 0x10;
pub const PACKET_CONFIG1_ADDRESS_FILTERING: u8 = 0x06;
// RegPacketConfig2 (FSK)
pub const PACKET_CONFIG2_DATA_MODE_MASK: u8 = 0xbf;
pub const PACKET_CONFIG2_DATA_MODE_PACKET: u8 = 0x40;
// RegSyncConfig (FSK)
pub const SYNC_CONFIG_SIZE_MASK: u8 = 0x07;
// RegFifoThresh (FSK)
pub const FIFO_THRESH_MASK: u8 = 0x3f;

// RegPaConfig
pub const PA_CONFIG_PA_SELECT_MASK: u8 = 0x7f;
pub const PA_CONFIG_PA_BOOST: u8 = 0x80;
pub const PA_CONFIG_MAX_POWER_MASK: u8 = 0x8f;
pub const PA_CONFIG_MAX_POWER: u8 = 0x70;
pub const PA_CONFIG_OUTPUT_POWER_MASK: u8 = 0xf0;
// RegPaDac
pub const PA_DAC_MASK: u8 = 0xf8;
pub const PA_DAC_20DBM_ON: u8 = 0x07;
pub const PA_DAC_20DBM_OFF: u8 = 0x04;

// RegTcxo
pub const TCXO_INPUT_ON: u8 = 0x10;

// RegImageCal (FSK page, reachable while in FSK mode)
pub const IMAGE_CAL_START_MASK: u8 = 0xbf;
pub const IMAGE_CAL_START: u8 = 0x40;
pub const IMAGE_CAL_RUNNING: u8 = 0x20;

// RegModemConfig1
pub const MODEM_CONFIG1_BW_MASK: u8 = 0x0f;
pub const MODEM_CONFIG1_CR_MASK: u8 = 0xf1;
pub const MODEM_CONFIG1_IMPLICIT_HEADER_MASK: u8 = 0xfe;
// RegModemConfig2
pub const MODEM_CONFIG2_SF_MASK: u8 = 0x0f;
pub const MODEM_CONFIG2_RX_PAYLOAD_CRC_MASK: u8 = 0xfb;
pub const MODEM_CONFIG2_SYMB_TIMEOUT_MSB_MASK: u8 = 0xfc;
// RegModemConfig3
pub const MODEM_CONFIG3_LOW_DATA_RATE_OPTIMIZE_MASK: u8 = 0xf7;
pub const MODEM_CONFIG3_LOW_DATA_RATE_OPTIMIZE_ON: u8 = 0x08;

// RegPllHop
pub const PLL_HOP_FAST_HOP_MASK: u8 = 0x7f;
pub const PLL_HOP_FAST_HOP_ON: u8 = 0x80;

// RegDetectOptimize / RegDetectionThreshold
pub const DETECTION_OPTIMIZE_MASK: u8 = 0xf8;
pub const DETECTION_OPTIMIZE_SF6: u8 = 0x05;
pub const DETECTION_OPTIMIZE_SF7_TO_SF12: u8 = 0x03;
pub const DETECTION_THRESHOLD_SF6: u8 = 0x0c;
pub const DETECTION_THRESHOLD_SF7_TO_SF12: u8 = 0x0a;
pub const DETECTION_OPTIMIZE_AUTOMATIC_IF_ON: u8 = 0x80;

// RegInvertIq / RegInvertIq2
pub const INVERT_IQ_RX_MASK: u8 = 0xbf;
pub const INVERT_IQ_RX_ON: u8 = 0x40;
pub const INVERT_IQ_TX_MASK: u8 = 0xfe;
pub const INVERT_IQ_TX_ON: u8 = 0x00;
pub const INVERT_IQ_TX_OFF: u8 = 0x01;
pub const INVERT_IQ2_ON: u8 = 0x19;
pub const INVERT_IQ2_OFF: u8 = 0x1d;

// LoRa sync words
pub const LORA_MAC_PUBLIC_SYNCWORD: u8 = 0x34;
pub const LORA_MAC_PRIVATE_SYNCWORD: u8 = 0x12;

// Errata 2.1, sensitivity optimization with a 500 kHz bandwidth: (RegTest36, RegTest3A)
pub const ERRATA_500KHZ_HF: (u8, u8) = (0x02, 0x64);
pub const ERRATA_500KHZ_LF: (u8, u8) = (0x02, 0x7f);
pub const ERRATA_500KHZ_OFF: u8 = 0x03;

/// FSK receiver bandwidth table, terminated by the invalid 300 kHz sentinel
pub const FSK_BANDWIDTHS: [FskBandwidth; 22] = [
    FskBandwidth::new(2600, 0x17),
    FskBandwidth::new(3100, 0x0f),
    FskBandwidth::new(3900, 0x07),
    FskBandwidth::new(5200, 0x16),
    FskBandwidth::new(6300, 0x0e),
    FskBandwidth::new(7800, 0x06),
    FskBandwidth::new(10400, 0x15),
    FskBandwidth::new(12500, 0x0d),
    FskBandwidth::new(15600, 0x05),
    FskBandwidth::new(20800, 0x14),
    FskBandwidth::new(25000, 0x0c),
    FskBandwidth::new(31300, 0x04),
    FskBandwidth::new(41700, 0x13),
    FskBandwidth::new(50000, 0x0b),
    FskBandwidth::new(62500, 0x03),
    FskBandwidth::new(83333, 0x12),
    FskBandwidth::new(100000, 0x0a),
    FskBandwidth::new(125000, 0x02),
    FskBandwidth::new(166700, 0x11),
    FskBandwidth::new(200000, 0x09),
    FskBandwidth::new(250000, 0x01),
    FskBandwidth::new(300000, 0x00),
];

/// A register write of the power-on configuration
#[derive(Clone, Copy)]
pub enum InitWrite {
    Fsk(FskRegister, u8),
    LoRa(LoRaRegister, u8),
    Common(Register, u8),
}

/// Register values loaded by `init_radio` and by the TX timeout recovery.
///
/// Each entry is written with the radio switched to the entry's modem page.
pub const RADIO_INIT_REGISTERS: [InitWrite; 16] = [
    InitWrite::Common(Register::Lna, 0x23),
    InitWrite::Fsk(FskRegister::RxConfig, 0x1e),
    InitWrite::Fsk(FskRegister::RssiConfig, 0xd2),
    InitWrite::Fsk(FskRegister::AfcFei, 0x01),
    InitWrite::Fsk(FskRegister::PreambleDetect, 0xaa),
    InitWrite::Fsk(FskRegister::Osc, 0x07),
    InitWrite::Fsk(FskRegister::SyncConfig, 0x12),
    InitWrite::Fsk(FskRegister::SyncValue1, 0xc1),
    InitWrite::Fsk(FskRegister::SyncValue2, 0x94),
    InitWrite::Fsk(FskRegister::SyncValue3, 0xc1),
    InitWrite::Fsk(FskRegister::PacketConfig1, 0xd8),
    InitWrite::Fsk(FskRegister::FifoThresh, 0x8f),
    InitWrite::Fsk(FskRegister::ImageCal, 0x02),
    InitWrite::Common(Register::DioMapping1, 0x00),
    InitWrite::Common(Register::DioMapping2, 0x30),
    InitWrite::LoRa(LoRaRegister::PayloadMaxLength, 0x40),
];
