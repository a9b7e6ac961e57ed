use crate::{MortonCode, PrimitiveId};

/// Sorts primitives by their Morton codes, looking only at the lowest
/// `key_bits` bits of each code.
///
/// This is a stable LSB radix sort doing two passes: first over the lower half
/// of the key, then over the upper half.
pub fn sort_by_code(items: &mut [(MortonCode, PrimitiveId)], key_bits: u32) {
    debug_assert!(key_bits <= 63, "Key too wide: {key_bits} bits");

    let low_bits = key_bits / 2;
    let high_bits = key_bits - low_bits;
    let mut scratch = items.to_vec();

    sort_pass(items, &mut scratch, 0, low_bits);
    sort_pass(&scratch, items, low_bits, high_bits);
}

fn sort_pass(
    source: &[(MortonCode, PrimitiveId)],
    target: &mut [(MortonCode, PrimitiveId)],
    shift: u32,
    bits: u32,
) {
    let buckets = 1usize << bits;
    let mask = (buckets - 1) as u64;
    let bucket_of =
        |code: MortonCode| ((code.get() >> shift) & mask) as usize;

    let mut offsets = vec![0usize; buckets];

    for (code, _) in source {
        offsets[bucket_of(*code)] += 1;
    }

    let mut sum = 0;

    for offset in &mut offsets {
        let count = *offset;

        *offset = sum;
        sum += count;
    }

    for item in source {
        let offset = &mut offsets[bucket_of(item.0)];

        target[*offset] = *item;
        *offset += 1;
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    #[test]
    fn sort() {
        let mut rng = StdRng::seed_from_u64(0);

        let mut items: Vec<_> = (0..5000)
            .map(|id| {
                (
                    MortonCode::new(rng.gen_range(0..(1 << 30))),
                    PrimitiveId::new(id),
                )
            })
            .collect();

        let mut expected = items.clone();

        expected.sort_by_key(|(code, _)| *code);
        sort_by_code(&mut items, 30);

        assert_eq!(expected, items);
    }

    #[test]
    fn sort_is_stable() {
        let mut items: Vec<_> = [5, 1, 5, 0, 1, 5]
            .into_iter()
            .enumerate()
            .map(|(id, code)| {
                (MortonCode::new(code), PrimitiveId::new(id as u32))
            })
            .collect();

        sort_by_code(&mut items, 3);

        let ids: Vec<_> = items.iter().map(|(_, id)| id.get()).collect();

        assert_eq!(vec![3, 1, 4, 0, 2, 5], ids);
    }

    #[test]
    fn sort_empty() {
        let mut items = Vec::new();

        sort_by_code(&mut items, 30);

        assert!(items.is_empty());
    }
}
