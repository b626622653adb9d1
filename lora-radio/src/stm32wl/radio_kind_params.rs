use crate::mod_params::*;

#[derive(Clone, Copy, PartialEq, Debug)]
#[allow(clippy::upper_case_acronyms)]
pub enum PacketType {
    GFSK = 0x00,
    LoRa = 0x01,
}

impl PacketType {
    pub const fn value(self) -> u8 {
        self as u8
    }

    pub fn modem(self) -> RadioModem {
        match self {
            PacketType::GFSK => RadioModem::Fsk,
            PacketType::LoRa => RadioModem::LoRa,
        }
    }
}

impl From<RadioModem> for PacketType {
    fn from(modem: RadioModem) -> Self {
        match modem {
            RadioModem::Fsk => PacketType::GFSK,
            RadioModem::LoRa => PacketType::LoRa,
        }
    }
}

#[derive(Clone, Copy)]
#[allow(dead_code)]
pub enum IrqMask {
    None = 0x0000,
    TxDone = 0x0001,
    RxDone = 0x0002,
    PreambleDetected = 0x0004,
    SyncwordValid = 0x0008,
    HeaderValid = 0x0010,
    HeaderError = 0x0020,
    CRCError = 0x0040,
    CADDone = 0x0080,
    CADActivityDetected = 0x0100,
    RxTxTimeout = 0x0200,
    All = 0xFFFF,
}

impl IrqMask {
    pub fn value(self) -> u16 {
        self as u16
    }

    pub fn is_set_in(self, mask: u16) -> bool {
        self.value() & mask == self.value()
    }
}

#[derive(Clone, Copy)]
#[allow(clippy::upper_case_acronyms)]
pub enum Register {
    /// Number of symbols given as REG_LR_SYNCH_TIMEOUT[7:3] * 2 ^ (2*REG_LR_SYNCH_TIMEOUT[2:0] + 1)
    SynchTimeout = 0x0706,
    WhiteningSeed = 0x06B8,
    CrcSeed = 0x06BC,
    CrcPolynomial = 0x06BE,
    Syncword = 0x06C0,              // GFSK syncword
    LoRaSyncword = 0x0740,          // LoRa syncword, reset by SetPacketType
    GeneratedRandomNumber = 0x0819, // 32-bit random number
    AnaLNA = 0x08E2,                // disable the LNA
    AnaMixer = 0x08E5,              // disable the mixer
    RxGain = 0x08AC,                // RX gain (0x94: power saving, 0x96: rx boosted)
    OCP = 0x08E7,                   // over current protection max value
    RetentionList = 0x029F,
    /// Inverted IQ operation optimization, DS.SX1261-2.W.APP Rev.2.1 chapter 15.4
    IQPolarity = 0x0736,
    TxModulation = 0x0889, // modulation quality with the 500 kHz LoRa bandwidth
    RTCCtrl = 0x0902,
    EvtClr = 0x0944,
}

impl Register {
    pub fn addr1(self) -> u8 {
        ((self as u16 & 0xFF00) >> 8) as u8
    }
    pub fn addr2(self) -> u8 {
        (self as u16 & 0x00FF) as u8
    }
}

#[derive(Clone, Copy, PartialEq)]
#[allow(dead_code)]
pub enum OpCode {
    GetStatus = 0xC0,
    WriteRegister = 0x0D,
    ReadRegister = 0x1D,
    WriteBuffer = 0x0E,
    ReadBuffer = 0x1E,
    SetSleep = 0x84,
    SetStandby = 0x80,
    SetTx = 0x83,
    SetRx = 0x82,
    SetCAD = 0xC5,
    SetTxContinuousWave = 0xD1,
    SetPacketType = 0x8A,
    GetPacketType = 0x11,
    SetRFFrequency = 0x86,
    SetTxParams = 0x8E,
    SetPAConfig = 0x95,
    SetCADParams = 0x88,
    SetBufferBaseAddress = 0x8F,
    SetModulationParams = 0x8B,
    SetPacketParams = 0x8C,
    GetRxBufferStatus = 0x13,
    GetPacketStatus = 0x14,
    GetRSSIInst = 0x15,
    CfgDIOIrq = 0x08,
    GetIrqStatus = 0x12,
    ClrIrqStatus = 0x02,
    Calibrate = 0x89,
    CalibrateImage = 0x98,
    SetRegulatorMode = 0x96,
    ClearDeviceErrors = 0x07,
    SetTCXOMode = 0x97,
    SetStopRxTimerOnPreamble = 0x9F,
    SetLoRaSymbTimeout = 0xA0,
}

impl OpCode {
    pub fn value(self) -> u8 {
        self as u8
    }
}

// See RM0453 Reference manual STM32WL5x advanced Arm®-based 32-bit MCUs with sub-GHz radio solution, section 5.8.5
#[derive(Clone, Copy, PartialEq)]
pub enum OpStatusErrorMask {
    Timeout = (0x03 << 1),
    ProcessingError = (0x04 << 1),
    ExecutionError = (0x05 << 1),
}

impl OpStatusErrorMask {
    pub fn is_error(status: u8) -> bool {
        let error_flags = status & 0x0e;
        OpStatusErrorMask::Timeout as u8 == error_flags
            || OpStatusErrorMask::ProcessingError as u8 == error_flags
            || OpStatusErrorMask::ExecutionError as u8 == error_flags
    }
}

#[derive(Clone, Copy)]
pub struct SleepParams {
    pub wakeup_rtc: bool, // get out of sleep mode if wakeup signal received from RTC
    pub reset: bool,
    pub warm_start: bool,
}

impl SleepParams {
    pub fn value(self) -> u8 {
        ((self.warm_start as u8) << 2) | ((self.reset as u8) << 1) | (self.wakeup_rtc as u8)
    }
}

#[derive(Clone, Copy, PartialEq)]
#[allow(clippy::upper_case_acronyms)]
pub enum StandbyMode {
    RC = 0x00,
}

impl StandbyMode {
    pub fn value(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Copy)]
pub enum RegulatorMode {
    UseDCDC = 0x01,
}

impl RegulatorMode {
    pub fn value(self) -> u8 {
        self as u8
    }
}

/// Voltage supplied by the radio to the TCXO
#[allow(missing_docs)]
#[derive(Clone, Copy)]
pub enum TcxoCtrlVoltage {
    Ctrl1V6 = 0x00,
    Ctrl1V7 = 0x01,
    Ctrl1V8 = 0x02,
    Ctrl2V2 = 0x03,
    Ctrl2V4 = 0x04,
    Ctrl2V7 = 0x05,
    Ctrl3V0 = 0x06,
    Ctrl3V3 = 0x07,
}

impl TcxoCtrlVoltage {
    pub(crate) fn value(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Copy, PartialEq)]
pub enum DeviceSel {
    HighPowerPA = 0x00,
    LowPowerPA = 0x01,
}

#[derive(Clone, Copy)]
#[allow(dead_code)]
pub enum RampTime {
    Ramp10Us = 0x00,
    Ramp40Us = 0x02,
    Ramp200Us = 0x04,
}

impl RampTime {
    pub fn value(self) -> u8 {
        self as u8
    }
}

pub fn bandwidth_value(bandwidth: Bandwidth) -> u8 {
    match bandwidth {
        Bandwidth::_125KHz => 0x04,
        Bandwidth::_250KHz => 0x05,
        Bandwidth::_500KHz => 0x06,
    }
}

#[derive(Clone, Copy)]
#[allow(dead_code)]
pub enum CADSymbols {
    _1 = 0x00,
    _2 = 0x01,
    _4 = 0x02,
    _8 = 0x03,
    _16 = 0x04,
}

impl CADSymbols {
    pub fn value(self) -> u8 {
        self as u8
    }
}

// GFSK modulation shaping, gaussian BT 1.0
pub const GFSK_PULSE_SHAPE_BT_1: u8 = 0x0B;
// 8 bit preamble detector
pub const GFSK_PREAMBLE_DETECTOR_08_BITS: u8 = 0x04;
pub const GFSK_ADDRESS_FILTERING_OFF: u8 = 0x00;
pub const GFSK_HEADER_FIXED: u8 = 0x00;
pub const GFSK_HEADER_VARIABLE: u8 = 0x01;
pub const GFSK_CRC_OFF: u8 = 0x01;
// Two byte inverted CRC, CCITT with the seed/polynomial below
pub const GFSK_CRC_2_BYTES_INV: u8 = 0x06;
pub const GFSK_CRC_CCITT_SEED: u16 = 0x1D0F;
pub const GFSK_CRC_CCITT_POLYNOMIAL: u16 = 0x1021;
pub const GFSK_WHITENING_ON: u8 = 0x01;
pub const GFSK_WHITENING_SEED: u16 = 0x01FF;
pub const GFSK_SYNCWORD: [u8; 3] = [0xC1, 0x94, 0xC1];

// Syncwords for public and private networks
pub const LORA_MAC_PUBLIC_SYNCWORD: u16 = 0x3444; // SX1276 syncword 0x34
pub const LORA_MAC_PRIVATE_SYNCWORD: u16 = 0x1424; // SX1276 syncword 0x12

/// GFSK receiver bandwidth table (double sided), terminated by the invalid 500 kHz sentinel
pub const FSK_BANDWIDTHS: [FskBandwidth; 22] = [
    FskBandwidth::new(4800, 0x1F),
    FskBandwidth::new(5800, 0x17),
    FskBandwidth::new(7300, 0x0F),
    FskBandwidth::new(9700, 0x1E),
    FskBandwidth::new(11700, 0x16),
    FskBandwidth::new(14600, 0x0E),
    FskBandwidth::new(19500, 0x1D),
    FskBandwidth::new(23400, 0x15),
    FskBandwidth::new(29300, 0x0D),
    FskBandwidth::new(39000, 0x1C),
    FskBandwidth::new(46900, 0x14),
    FskBandwidth::new(58600, 0x0C),
    FskBandwidth::new(78200, 0x1B),
    FskBandwidth::new(93800, 0x13),
    FskBandwidth::new(117300, 0x0B),
    FskBandwidth::new(156200, 0x1A),
    FskBandwidth::new(187200, 0x12),
    FskBandwidth::new(234300, 0x0A),
    FskBandwidth::new(312000, 0x19),
    FskBandwidth::new(373600, 0x11),
    FskBandwidth::new(467000, 0x09),
    FskBandwidth::new(500000, 0x00),
];

/// Image calibration band for a channel, in 4 MHz steps
pub fn image_calibration_band(frequency_in_hz: u32) -> [u8; 2] {
    if frequency_in_hz > 900_000_000 {
        [0xE1, 0xE9]
    } else if frequency_in_hz > 850_000_000 {
        [0xD7, 0xDB]
    } else if frequency_in_hz > 770_000_000 {
        [0xC1, 0xC5]
    } else if frequency_in_hz > 460_000_000 {
        [0x75, 0x81]
    } else if frequency_in_hz > 425_000_000 {
        [0x6B, 0x6F]
    } else {
        [0x00, 0x00]
    }
}
