use std::io::Read;

use rand_core::RngCore;
use rand_distr::{Distribution, Normal};

use crate::error::GenError;

/// An endless stream of zero bytes, substituted for the random source when a
/// file asks for zero content.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroReader;

impl Read for ZeroReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        buf.fill(0);
        Ok(buf.len())
    }
}

/// Adapts a seeded PRNG into the `io::Read` byte stream the generator
/// consumes for payloads, names and distribution draws.
#[derive(Debug)]
pub struct EntropyReader<R: RngCore> {
    rng: R,
}

impl<R: RngCore> EntropyReader<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: RngCore> Read for EntropyReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.rng.fill_bytes(buf);
        Ok(buf.len())
    }
}

/// Presents the generator's byte stream as an `RngCore` by reading 64-bit
/// big-endian words, so distribution sampling and raw byte consumption share
/// one stream and reseeding never happens.
struct StreamRng<'a> {
    reader: &'a mut dyn Read,
}

impl RngCore for StreamRng<'_> {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        let mut word = [0u8; 8];
        // The sources feeding generation are endless (a PRNG or ZeroReader).
        self.reader
            .read_exact(&mut word)
            .expect("random byte stream ended");
        u64::from_be_bytes(word)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.reader
            .read_exact(dest)
            .expect("random byte stream ended");
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.reader
            .read_exact(dest)
            .map_err(rand_core::Error::new)
    }
}

/// One draw from `N(mean, |mean|/10)`, truncated to an integer. Callers
/// resample until the draw satisfies their own bound. The reader must be a
/// genuinely random stream; ziggurat sampling does not terminate on constant
/// input.
pub fn rand_norm_int(reader: &mut dyn Read, mean: i64) -> Result<i64, GenError> {
    let normal = Normal::new(mean as f64, (mean as f64 / 10.0).abs())
        .map_err(|e| GenError::Distribution(e.to_string()))?;
    let mut rng = StreamRng { reader };
    Ok(normal.sample(&mut rng) as i64)
}
