#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub frame: i64,
    pub value: f64,
}

/// Where a frame falls relative to the stored keyframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bracket {
    Exact(usize),
    /// `keys[lower].frame < frame < keys[lower + 1].frame`.
    Between { lower: usize },
    AfterLast(usize),
    BeforeFirst,
    Empty,
}

/// Sorted by frame, at most one value per frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyframeTrack {
    keys: Vec<Keyframe>,
}

impl KeyframeTrack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (i64, f64)>) -> Self {
        let mut track = Self::new();
        for (frame, value) in pairs {
            track.insert(frame, value);
        }
        track
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    /// Returns the value previously stored at `frame`, if any.
    pub fn insert(&mut self, frame: i64, value: f64) -> Option<f64> {
        match self.keys.binary_search_by_key(&frame, |key| key.frame) {
            Ok(index) => Some(std::mem::replace(&mut self.keys[index].value, value)),
            Err(index) => {
                self.keys.insert(index, Keyframe { frame, value });
                None
            }
        }
    }

    pub fn remove(&mut self, frame: i64) -> Option<f64> {
        let index = self
            .keys
            .binary_search_by_key(&frame, |key| key.frame)
            .ok()?;
        Some(self.keys.remove(index).value)
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn get(&self, frame: i64) -> Option<f64> {
        self.keys
            .binary_search_by_key(&frame, |key| key.frame)
            .ok()
            .map(|index| self.keys[index].value)
    }

    pub fn bracket(&self, frame: i64) -> Bracket {
        if self.keys.is_empty() {
            return Bracket::Empty;
        }
        match self.keys.binary_search_by_key(&frame, |key| key.frame) {
            Ok(index) => Bracket::Exact(index),
            Err(0) => Bracket::BeforeFirst,
            Err(index) if index == self.keys.len() => Bracket::AfterLast(index - 1),
            Err(index) => Bracket::Between { lower: index - 1 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_order_and_replaces_same_frame() {
        let mut track = KeyframeTrack::new();
        assert_eq!(track.insert(10, 1.0), None);
        assert_eq!(track.insert(-2, 2.0), None);
        assert_eq!(track.insert(4, 3.0), None);
        assert_eq!(track.insert(4, 5.0), Some(3.0));

        let frames: Vec<i64> = track.keys().iter().map(|key| key.frame).collect();
        assert_eq!(frames, vec![-2, 4, 10]);
        assert_eq!(track.get(4), Some(5.0));
    }

    #[test]
    fn remove_deletes_only_the_requested_frame() {
        let mut track = KeyframeTrack::from_pairs([(0, 1.0), (5, 2.0)]);
        assert_eq!(track.remove(3), None);
        assert_eq!(track.remove(5), Some(2.0));
        assert_eq!(track.len(), 1);
        track.clear();
        assert!(track.is_empty());
    }

    #[test]
    fn bracket_classifies_frames() {
        let track = KeyframeTrack::from_pairs([(0, 0.0), (10, 1.0), (20, 2.0)]);
        assert_eq!(track.bracket(-1), Bracket::BeforeFirst);
        assert_eq!(track.bracket(0), Bracket::Exact(0));
        assert_eq!(track.bracket(15), Bracket::Between { lower: 1 });
        assert_eq!(track.bracket(25), Bracket::AfterLast(2));
        assert_eq!(KeyframeTrack::new().bracket(0), Bracket::Empty);
    }
}
