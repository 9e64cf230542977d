/// Fixed-capacity set of indices in `0..capacity`, one bit per index.
pub struct Set {
    words: Vec<u64>,
    capacity: usize,
}

const BITS: usize = u64::BITS as usize;

impl Set {
    pub fn new(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(BITS)],
            capacity,
        }
    }

    pub fn reset(&mut self, capacity: usize) {
        self.words.clear();
        self.words.resize(capacity.div_ceil(BITS), 0);
        self.capacity = capacity;
    }

    /// Out-of-range indices are ignored.
    pub fn add(&mut self, x: usize) {
        if x >= self.capacity {
            return;
        }
        self.words[x / BITS] |= 1u64 << (x % BITS);
    }

    pub fn has(&self, x: usize) -> bool {
        if x >= self.capacity {
            return false;
        }
        self.words[x / BITS] & (1u64 << (x % BITS)) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::Set;

    #[test]
    fn add_and_has() {
        let mut set = Set::new(130);
        assert!((0..130).all(|x| !set.has(x)));
        for x in [0, 63, 64, 129] {
            set.add(x);
        }
        set.add(64);
        assert_eq!((0..130).filter(|&x| set.has(x)).count(), 4);
        assert!(set.has(63) && set.has(64) && set.has(129));
        assert!(!set.has(1));
        assert!(!set.has(130));
    }

    #[test]
    fn out_of_range_is_ignored() {
        let mut set = Set::new(10);
        set.add(10);
        set.add(63);
        assert!(!set.has(10));
        assert!(!set.has(63));
    }

    #[test]
    fn reset_clears_and_resizes() {
        let mut set = Set::new(8);
        set.add(3);
        set.reset(200);
        assert!(!set.has(3));
        assert!(!set.has(200));
        set.add(199);
        assert!(set.has(199));
    }
}
