use rand::Rng;

/// Fisher-Yates (Knuth) shuffle in place.
///
/// Walks from the last index down to 1, swapping each slot with a uniformly
/// drawn index in `[0, i]`.
pub fn fisher_yates<T, R>(items: &mut [T], rng: &mut R)
where
    R: Rng + ?Sized,
{
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

/// Owned variant of [`fisher_yates`].
pub fn shuffled<T, R>(mut items: Vec<T>, rng: &mut R) -> Vec<T>
where
    R: Rng + ?Sized,
{
    fisher_yates(&mut items, rng);
    items
}
