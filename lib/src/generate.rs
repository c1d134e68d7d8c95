use crate::{ALPHABET, ALPHABET_SIZE};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum GenerateError {
    #[error("index {index} exceeds maximum combinations for length {max_length}")]
    IndexOutOfRange { index: u64, max_length: u8 },
}

/// Map a global candidate index to its string.
///
/// Indices `[0, 36)` are the length-1 strings in alphabet order, the next
/// `36^2` the length-2 strings, and so on. Within a length band the
/// remainder is read as a base-36 numeral over [`ALPHABET`] and emitted
/// most significant digit first: the first length-2 candidate is `"aa"`,
/// the last `"99"`.
pub fn candidate(index: u64, max_length: u8) -> Result<String, GenerateError> {
    let mut length = 1u32;
    let mut band_start = 0u64;
    loop {
        if length > u32::from(max_length) {
            return Err(GenerateError::IndexOutOfRange { index, max_length });
        }
        let band = ALPHABET_SIZE.pow(length);
        if index < band_start + band {
            break;
        }
        band_start += band;
        length += 1;
    }

    let mut remainder = index - band_start;
    let mut digits = vec![0u8; length as usize];
    for slot in digits.iter_mut().rev() {
        *slot = ALPHABET[(remainder % ALPHABET_SIZE) as usize];
        remainder /= ALPHABET_SIZE;
    }

    Ok(digits.iter().map(|&b| b as char).collect())
}

/// Lazily generate the candidates of `[start_index, start_index + count)`.
pub fn candidates(
    start_index: u64,
    count: u64,
    max_length: u8,
) -> impl Iterator<Item = Result<String, GenerateError>> {
    (0..count).map(move |i| candidate(start_index + i, max_length))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;
    use crate::keyspace::total_combinations;

    #[test]
    fn first_and_last_of_each_band() {
        assert_eq!(candidate(0, 2).unwrap(), "a");
        assert_eq!(candidate(35, 2).unwrap(), "9");
        assert_eq!(candidate(36, 2).unwrap(), "aa");
        assert_eq!(candidate(37, 2).unwrap(), "ab");
        assert_eq!(candidate(36 + 36, 2).unwrap(), "ba");
        assert_eq!(candidate(36 + 1296 - 1, 2).unwrap(), "99");
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        assert_eq!(
            candidate(36, 1),
            Err(GenerateError::IndexOutOfRange {
                index: 36,
                max_length: 1
            })
        );
        let total = total_combinations(3);
        assert!(candidate(total, 3).is_err());
        assert!(candidate(total - 1, 3).is_ok());
    }

    #[test]
    fn bijection_over_lengths_up_to_two() {
        let total = total_combinations(2);
        let mut seen = HashSet::new();
        for index in 0..total {
            let s = candidate(index, 2).unwrap();
            assert!(!s.is_empty() && s.len() <= 2);
            assert!(s.bytes().all(|b| ALPHABET.contains(&b)));
            assert!(seen.insert(s), "index {index} produced a duplicate");
        }
        assert_eq!(seen.len() as u64, total);
    }

    #[test]
    fn candidates_walks_the_range() {
        let strings: Vec<_> = candidates(34, 4, 2).map(Result::unwrap).collect();
        assert_eq!(strings, vec!["8", "9", "aa", "ab"]);
    }

    proptest! {
        #[test]
        fn generated_candidates_stay_in_the_alphabet(
            index in 0u64..total_combinations(4),
        ) {
            let s = candidate(index, 4).unwrap();
            prop_assert!(!s.is_empty() && s.len() <= 4);
            prop_assert!(s.bytes().all(|b| ALPHABET.contains(&b)));
        }

        #[test]
        fn ordering_holds_within_a_length_band(
            pair in (36u64..36 + 1296, 36u64..36 + 1296),
        ) {
            let (i, j) = pair;
            prop_assume!(i < j);
            let a = candidate(i, 2).unwrap();
            let b = candidate(j, 2).unwrap();
            prop_assert!(a < b);
        }
    }
}
