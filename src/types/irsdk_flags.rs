//! Constants and enumerations for interpreting SDK telemetry values
//!
//! Bitfield variables (`EngineWarnings`, `SessionFlags`, `CamCameraState`,
//! `PitSvFlags`, `CarIdxPaceFlags`) are read as [`BitField`](super::BitField)
//! and tested against the constants below. Enumerated integer variables
//! (`PlayerTrackSurface`, `SessionState`, ...) decode through `TryFrom<i32>`.

use serde::{Deserialize, Serialize};

/// Lap count reported when a session has no lap limit.
pub const UNLIMITED_LAPS: i32 = 32767;
/// Session time reported when a session has no time limit.
pub const UNLIMITED_TIME: f32 = 604_800.0;

pub mod engine_warnings {
    pub const WATER_TEMP_WARNING: u32 = 0x01;
    pub const FUEL_PRESSURE_WARNING: u32 = 0x02;
    pub const OIL_PRESSURE_WARNING: u32 = 0x04;
    pub const ENGINE_STALLED: u32 = 0x08;
    pub const PIT_SPEED_LIMITER: u32 = 0x10;
    pub const REV_LIMITER_ACTIVE: u32 = 0x20;
    pub const OIL_TEMP_WARNING: u32 = 0x40;
}

pub mod session_flags {
    // global flags
    pub const CHECKERED: u32 = 0x0000_0001;
    pub const WHITE: u32 = 0x0000_0002;
    pub const GREEN: u32 = 0x0000_0004;
    pub const YELLOW: u32 = 0x0000_0008;
    pub const RED: u32 = 0x0000_0010;
    pub const BLUE: u32 = 0x0000_0020;
    pub const DEBRIS: u32 = 0x0000_0040;
    pub const CROSSED: u32 = 0x0000_0080;
    pub const YELLOW_WAVING: u32 = 0x0000_0100;
    pub const ONE_LAP_TO_GREEN: u32 = 0x0000_0200;
    pub const GREEN_HELD: u32 = 0x0000_0400;
    pub const TEN_TO_GO: u32 = 0x0000_0800;
    pub const FIVE_TO_GO: u32 = 0x0000_1000;
    pub const RANDOM_WAVING: u32 = 0x0000_2000;
    pub const CAUTION: u32 = 0x0000_4000;
    pub const CAUTION_WAVING: u32 = 0x0000_8000;

    // driver black flags
    pub const BLACK: u32 = 0x0001_0000;
    pub const DISQUALIFY: u32 = 0x0002_0000;
    pub const SERVICEABLE: u32 = 0x0004_0000; // car may be serviced, not a flag
    pub const FURLED: u32 = 0x0008_0000;
    pub const REPAIR: u32 = 0x0010_0000;

    // start lights
    pub const START_HIDDEN: u32 = 0x1000_0000;
    pub const START_READY: u32 = 0x2000_0000;
    pub const START_SET: u32 = 0x4000_0000;
    pub const START_GO: u32 = 0x8000_0000;
}

pub mod camera_state {
    pub const IS_SESSION_SCREEN: u32 = 0x0001;
    pub const IS_SCENIC_ACTIVE: u32 = 0x0002;

    // can be changed with a broadcast message
    pub const CAM_TOOL_ACTIVE: u32 = 0x0004;
    pub const UI_HIDDEN: u32 = 0x0008;
    pub const USE_AUTO_SHOT_SELECTION: u32 = 0x0010;
    pub const USE_TEMPORARY_EDITS: u32 = 0x0020;
    pub const USE_KEY_ACCELERATION: u32 = 0x0040;
    pub const USE_KEY_10X_ACCELERATION: u32 = 0x0080;
    pub const USE_MOUSE_AIM_MODE: u32 = 0x0100;
}

pub mod pit_service_flags {
    pub const LF_TIRE_CHANGE: u32 = 0x0001;
    pub const RF_TIRE_CHANGE: u32 = 0x0002;
    pub const LR_TIRE_CHANGE: u32 = 0x0004;
    pub const RR_TIRE_CHANGE: u32 = 0x0008;
    pub const FUEL_FILL: u32 = 0x0010;
    pub const WINDSHIELD_TEAROFF: u32 = 0x0020;
    pub const FAST_REPAIR: u32 = 0x0040;
}

pub mod pace_flags {
    pub const END_OF_LINE: u32 = 0x01;
    pub const FREE_PASS: u32 = 0x02;
    pub const WAVED_AROUND: u32 = 0x04;
}

/// Declares a fieldless enum with an explicit SDK value per variant and a
/// `TryFrom<i32>` that returns the unknown value as the error.
macro_rules! sdk_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $value:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Raw SDK value of this variant.
            pub const fn raw(self) -> i32 {
                match self {
                    $($name::$variant => $value),+
                }
            }
        }

        impl TryFrom<i32> for $name {
            type Error = i32;

            fn try_from(value: i32) -> Result<Self, i32> {
                match value {
                    $(v if v == $value => Ok($name::$variant),)+
                    other => Err(other),
                }
            }
        }
    };
}

sdk_enum! {
    /// `PlayerTrackSurface` / `CarIdxTrackSurface`
    TrackLocation {
        NotInWorld = -1,
        OffTrack = 0,
        InPitStall = 1,
        ApproachingPits = 2,
        OnTrack = 3,
    }
}

sdk_enum! {
    /// `PlayerTrackSurfaceMaterial` / `CarIdxTrackSurfaceMaterial`
    TrackSurface {
        NotInWorld = -1,
        Undefined = 0,
        Asphalt1 = 1,
        Asphalt2 = 2,
        Asphalt3 = 3,
        Asphalt4 = 4,
        Concrete1 = 5,
        Concrete2 = 6,
        RacingDirt1 = 7,
        RacingDirt2 = 8,
        Paint1 = 9,
        Paint2 = 10,
        Rumble1 = 11,
        Rumble2 = 12,
        Rumble3 = 13,
        Rumble4 = 14,
        Grass1 = 15,
        Grass2 = 16,
        Grass3 = 17,
        Grass4 = 18,
        Dirt1 = 19,
        Dirt2 = 20,
        Dirt3 = 21,
        Dirt4 = 22,
        Sand = 23,
        Gravel1 = 24,
        Gravel2 = 25,
        Grasscrete = 26,
        Astroturf = 27,
    }
}

sdk_enum! {
    /// `SessionState`
    SessionState {
        Invalid = 0,
        GetInCar = 1,
        Warmup = 2,
        ParadeLaps = 3,
        Racing = 4,
        Checkered = 5,
        CoolDown = 6,
    }
}

sdk_enum! {
    /// `CarLeftRight` spotter state
    CarLeftRight {
        Off = 0,
        Clear = 1,
        CarLeft = 2,
        CarRight = 3,
        CarLeftRight = 4,
        TwoCarsLeft = 5,
        TwoCarsRight = 6,
    }
}

sdk_enum! {
    /// `PlayerCarPitSvStatus`
    PitServiceStatus {
        None = 0,
        InProgress = 1,
        Complete = 2,
        TooFarLeft = 100,
        TooFarRight = 101,
        TooFarForward = 102,
        TooFarBack = 103,
        BadAngle = 104,
        CantFixThat = 105,
    }
}

sdk_enum! {
    /// `PaceMode`
    PaceMode {
        SingleFileStart = 0,
        DoubleFileStart = 1,
        SingleFileRestart = 2,
        DoubleFileRestart = 3,
        NotPacing = 4,
    }
}

impl PitServiceStatus {
    /// Whether the status reports a positioning error rather than progress.
    pub fn is_error(self) -> bool {
        self.raw() >= 100
    }
}
