//! One I²C controller shared by several drivers.
//!
//! The gauge (battery task) and the panel (display task) sit on the same
//! two wires.  Each [`SharedI2c`] handle locks the controller for the length
//! of one transaction, so transfers from different tasks never interleave.

use std::sync::{Arc, Mutex, PoisonError};

use embedded_hal::i2c::{ErrorType, I2c, Operation};

pub struct SharedI2c<I> {
    bus: Arc<Mutex<I>>,
}

impl<I> SharedI2c<I> {
    pub fn new(bus: I) -> Self {
        Self {
            bus: Arc::new(Mutex::new(bus)),
        }
    }
}

impl<I> Clone for SharedI2c<I> {
    fn clone(&self) -> Self {
        Self { bus: self.bus.clone() }
    }
}

impl<I: ErrorType> ErrorType for SharedI2c<I> {
    type Error = I::Error;
}

impl<I: I2c> I2c for SharedI2c<I> {
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
        self.bus
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .transaction(address, operations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::ErrorKind;

    #[derive(Default)]
    struct CountingBus {
        writes: usize,
    }

    impl ErrorType for CountingBus {
        type Error = ErrorKind;
    }

    impl I2c for CountingBus {
        fn transaction(&mut self, _address: u8, operations: &mut [Operation<'_>]) -> Result<(), ErrorKind> {
            for op in operations {
                if let Operation::Write(_) = op {
                    self.writes += 1;
                }
            }
            Ok(())
        }
    }

    #[test]
    fn clones_share_the_controller() {
        let mut a = SharedI2c::new(CountingBus::default());
        let mut b = a.clone();
        a.write(0x36, &[1]).unwrap();
        b.write(0x3C, &[2]).unwrap();
        assert_eq!(a.bus.lock().unwrap().writes, 2);
    }
}
