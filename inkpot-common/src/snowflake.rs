//! Snowflake ids: 42 bits of milliseconds since an epoch, 5 bits worker id,
//! 5 bits process id and a 12 bit wrapping increment.
//!
//! See <https://discord.com/developers/docs/reference#snowflakes>

use derive_where::derive_where;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    marker::PhantomData,
};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

pub const TIMESTAMP_OFFSET: u32 = 22;
pub const TIMESTAMP_LENGTH: u32 = 42;
pub const WORKER_ID_OFFSET: u32 = 17;
pub const WORKER_ID_LENGTH: u32 = 5;
pub const PROCESS_ID_OFFSET: u32 = 12;
pub const PROCESS_ID_LENGTH: u32 = 5;
pub const INCREMENT_LENGTH: u32 = 12;

const fn mask(length: u32) -> u64 {
    (1 << length) - 1
}

pub trait Epoch {
    const EPOCH_TIME: OffsetDateTime;
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum SnowflakeTimestampError {
    #[error("Specified time was before the snowflake epoch.")]
    TimeBeforeEpoch,
    #[error("Resulting timestamp uses too many bits.")]
    TimestampTooLarge,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Snowflake part was out of range: {0}")]
pub struct SnowflakePartOutOfRangeError(u64);

/// The machine half of a snowflake: which worker and process minted it.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
pub struct SnowflakeOrigin {
    worker_id: u8,
    process_id: u8,
}

impl SnowflakeOrigin {
    pub fn new(worker_id: u8, process_id: u8) -> Result<Self, SnowflakePartOutOfRangeError> {
        if u64::from(worker_id) > mask(WORKER_ID_LENGTH) {
            return Err(SnowflakePartOutOfRangeError(worker_id.into()));
        }
        if u64::from(process_id) > mask(PROCESS_ID_LENGTH) {
            return Err(SnowflakePartOutOfRangeError(process_id.into()));
        }

        Ok(Self {
            worker_id,
            process_id,
        })
    }

    #[must_use]
    pub fn worker_id(self) -> u8 {
        self.worker_id
    }

    #[must_use]
    pub fn process_id(self) -> u8 {
        self.process_id
    }
}

#[derive_where(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Debug,
    Default,
    Hash,
    Serialize,
    Deserialize
)]
#[serde(transparent)]
pub struct Snowflake<SnowflakeEpoch>(u64, #[serde(skip)] PhantomData<SnowflakeEpoch>);

impl<SnowflakeEpoch> Snowflake<SnowflakeEpoch> {
    #[must_use]
    pub fn new(inner: u64) -> Self {
        Self(inner, PhantomData)
    }

    pub fn from_parts(
        time: OffsetDateTime,
        origin: SnowflakeOrigin,
        increment: u16,
    ) -> Result<Self, SnowflakeTimestampError>
    where
        SnowflakeEpoch: Epoch,
    {
        let millis = (time - SnowflakeEpoch::EPOCH_TIME).whole_milliseconds();
        let millis =
            u64::try_from(millis).map_err(|_| SnowflakeTimestampError::TimeBeforeEpoch)?;
        if millis > mask(TIMESTAMP_LENGTH) {
            return Err(SnowflakeTimestampError::TimestampTooLarge);
        }

        let snowflake = millis << TIMESTAMP_OFFSET
            | u64::from(origin.worker_id) << WORKER_ID_OFFSET
            | u64::from(origin.process_id) << PROCESS_ID_OFFSET
            | u64::from(increment) & mask(INCREMENT_LENGTH);

        Ok(Self::new(snowflake))
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn timestamp(self) -> OffsetDateTime
    where
        SnowflakeEpoch: Epoch,
    {
        let millis = (self.0 >> TIMESTAMP_OFFSET).cast_signed();
        SnowflakeEpoch::EPOCH_TIME + Duration::milliseconds(millis)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn origin(self) -> SnowflakeOrigin {
        SnowflakeOrigin {
            worker_id: ((self.0 >> WORKER_ID_OFFSET) & mask(WORKER_ID_LENGTH)) as u8,
            process_id: ((self.0 >> PROCESS_ID_OFFSET) & mask(PROCESS_ID_LENGTH)) as u8,
        }
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn increment(self) -> u16 {
        (self.0 & mask(INCREMENT_LENGTH)) as u16
    }
}

impl<SnowflakeEpoch> Display for Snowflake<SnowflakeEpoch> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<SnowflakeEpoch> From<u64> for Snowflake<SnowflakeEpoch> {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl<SnowflakeEpoch> From<Snowflake<SnowflakeEpoch>> for u64 {
    fn from(value: Snowflake<SnowflakeEpoch>) -> Self {
        value.get()
    }
}

#[derive_where(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct SnowflakeGenerator<SnowflakeEpoch> {
    origin: SnowflakeOrigin,
    next_increment: u16,
    phantom_data: PhantomData<SnowflakeEpoch>,
}

impl<SnowflakeEpoch: Epoch> SnowflakeGenerator<SnowflakeEpoch> {
    #[must_use]
    pub fn new(origin: SnowflakeOrigin) -> Self {
        Self {
            origin,
            next_increment: 0,
            phantom_data: PhantomData,
        }
    }

    #[must_use]
    pub fn origin(&self) -> SnowflakeOrigin {
        self.origin
    }

    pub fn generate_at(
        &mut self,
        time: OffsetDateTime,
    ) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeTimestampError> {
        let snowflake = Snowflake::from_parts(time, self.origin, self.next_increment)?;
        self.next_increment = (self.next_increment + 1) & 0x0FFF;

        Ok(snowflake)
    }

    pub fn generate(&mut self) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeTimestampError> {
        self.generate_at(OffsetDateTime::now_utc())
    }
}

#[cfg(test)]
mod tests {
    use crate::snowflake::{
        Epoch, Snowflake, SnowflakeGenerator, SnowflakeOrigin, SnowflakeTimestampError,
    };
    use time::{Duration, OffsetDateTime, macros::datetime};

    struct MillennialEpoch;
    impl Epoch for MillennialEpoch {
        const EPOCH_TIME: OffsetDateTime = datetime!(2000-01-01 00:00 UTC);
    }

    #[test]
    fn origin_bounds() {
        assert!(SnowflakeOrigin::new(0, 0).is_ok());
        assert!(SnowflakeOrigin::new(0x1F, 0x1F).is_ok());
        assert!(SnowflakeOrigin::new(0x20, 0).is_err());
        assert!(SnowflakeOrigin::new(0, u8::MAX).is_err());
    }

    #[test]
    fn from_parts_round_trips() {
        let time = datetime!(2025-10-24 10:30 UTC);
        let origin = SnowflakeOrigin::new(0b10101, 0b10001).unwrap();

        let snowflake = Snowflake::<MillennialEpoch>::from_parts(time, origin, 100).unwrap();

        assert_eq!(snowflake.timestamp(), time);
        assert_eq!(snowflake.origin(), origin);
        assert_eq!(snowflake.increment(), 100);
    }

    #[test]
    fn timestamp_limits() {
        let origin = SnowflakeOrigin::default();

        assert_eq!(
            Snowflake::<MillennialEpoch>::from_parts(
                MillennialEpoch::EPOCH_TIME - Duration::milliseconds(1),
                origin,
                0
            ),
            Err(SnowflakeTimestampError::TimeBeforeEpoch)
        );
        assert_eq!(
            Snowflake::<MillennialEpoch>::from_parts(
                MillennialEpoch::EPOCH_TIME + Duration::milliseconds(0x0400_0000_0000),
                origin,
                0
            ),
            Err(SnowflakeTimestampError::TimestampTooLarge)
        );
        assert!(
            Snowflake::<MillennialEpoch>::from_parts(
                MillennialEpoch::EPOCH_TIME + Duration::milliseconds(0x03FF_FFFF_FFFF),
                origin,
                0
            )
            .is_ok()
        );
    }

    #[test]
    fn generator_increments_and_wraps() {
        let origin = SnowflakeOrigin::new(10, 0).unwrap();
        let time = datetime!(2025-10-24 10:55 UTC);
        let mut generator = SnowflakeGenerator::<MillennialEpoch>::new(origin);

        let first = generator.generate_at(time).unwrap();
        let second = generator.generate_at(time).unwrap();
        assert_eq!(first.increment(), 0);
        assert_eq!(second.increment(), 1);
        assert!(second > first);

        for _ in 2..0x1000 {
            generator.generate_at(time).unwrap();
        }
        assert_eq!(generator.generate_at(time).unwrap().increment(), 0);
    }

    #[test]
    fn later_snowflakes_sort_higher() {
        let mut generator = SnowflakeGenerator::<MillennialEpoch>::new(SnowflakeOrigin::default());

        let earlier = generator
            .generate_at(datetime!(2025-01-01 00:00 UTC))
            .unwrap();
        let later = generator
            .generate_at(datetime!(2025-01-01 00:00:00.001 UTC))
            .unwrap();
        assert!(later > earlier);
    }
}
