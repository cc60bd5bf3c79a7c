#![no_main]
use libfuzzer_sys::fuzz_target;
use wahbits::{CompressedBitset, ImplicitBitmap};

fn build(runs: &[(bool, u16)]) -> (CompressedBitset, ImplicitBitmap) {
    let mut bitset = CompressedBitset::new();
    let mut oracle = ImplicitBitmap::new();
    for &(bit, n) in runs {
        let n = u64::from(n % 512);
        if bit {
            bitset.add_ones(n).unwrap();
            oracle.add_ones(n);
        } else {
            bitset.add_zeros(n).unwrap();
            oracle.add_zeros(n);
        }
    }
    (bitset, oracle)
}

fuzz_target!(|data: (Vec<(bool, u16)>, Vec<(bool, u16)>, Vec<u32>)| {
    let (runs_a, runs_b, writes) = data;
    let (mut a, mut oa) = build(&runs_a);
    let (b, ob) = build(&runs_b);

    if !oa.is_empty() {
        for raw in writes {
            let pos = u64::from(raw) % oa.len();
            let value = raw & 1 == 1;
            let expected = oa.set(pos, value).unwrap();
            let old = if value { a.set(pos) } else { a.reset(pos) };
            assert_eq!(old, Ok(expected));
        }
    }

    let mut and = a.clone();
    and.and_with(&b);
    oa.and_with(&ob);
    and.check_invariants().unwrap();
    assert_eq!(and.len(), oa.len());
    assert_eq!(and.count_ones(), oa.count_ones());
    assert!(and.iter_set().eq(oa.iter_ones()));

    let decoded = CompressedBitset::from_bytes(&and.to_bytes()).unwrap();
    assert_eq!(decoded, and);
});
