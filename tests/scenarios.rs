use wahbits::{CompressedBitset, Error, Plwah64, Wah32, Word, WordLayout};

// 0..=4, 26, 27, 31 | 32..64 | 64..96 | 96..120, 127 | 140, 150 | ... | 280, 285
const DATA: [u8; 36] = [
    0x1f, 0x00, 0x00, 0x8c, //
    0xff, 0xff, 0xff, 0xff, //
    0xff, 0xff, 0xff, 0xff, //
    0xff, 0xff, 0xff, 0x80, //
    0x00, 0x10, 0x40, 0x00, //
    0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x21, //
];

// 63 | 76, 85 | 118, 119, 125 | 128..136, 138..152, 153, 156
const DATA2: [u8; 20] = [
    0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x80, //
    0x00, 0x10, 0x20, 0x00, //
    0x00, 0x00, 0xc0, 0x20, //
    0xff, 0xfc, 0xff, 0x12, //
];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn bit(bytes: &[u8], i: u64) -> bool {
    (bytes[(i / 8) as usize] >> (i % 8)) & 1 == 1
}

fn popcount(bytes: &[u8]) -> u64 {
    bytes.iter().map(|b| u64::from(b.count_ones())).sum()
}

fn bits_of(bytes: &[u8]) -> u64 {
    bytes.len() as u64 * 8
}

fn check_bytes<L: WordLayout>(bitset: &CompressedBitset<L>, bytes: &[u8], negated: bool) {
    for i in 0..bits_of(bytes) {
        assert_eq!(bitset.get(i), bit(bytes, i) ^ negated, "bit {i}");
    }
}

#[test]
fn test_simple_not() {
    let mut bitset = CompressedBitset::new();
    bitset.add_zeros(3).unwrap();
    assert!((0..4).all(|i| !bitset.get(i)));
    bitset.invert();
    assert!((0..3).all(|i| bitset.get(i)));
    assert!(!bitset.get(3));
}

#[test]
fn test_fill_coalescing_keeps_one_run() {
    let mut bitset = CompressedBitset::<Plwah64>::with_layout();
    bitset.add_zeros(63).unwrap();
    assert!((0..2 * 63).all(|i| !bitset.get(i)));
    bitset.add_zeros(3 * 63).unwrap();
    assert_eq!(bitset.run_count(), 1);
    assert_eq!(bitset.runs(), &[Word::fill(false, 4)]);

    bitset.clear();
    bitset.add_ones(63).unwrap();
    for i in 0..2 * 63 {
        assert_eq!(bitset.get(i), i < 63, "bit {i}");
    }
    bitset.add_ones(3 * 63).unwrap();
    assert_eq!(bitset.run_count(), 1);
    for i in 0..5 * 63 {
        assert_eq!(bitset.get(i), i < 4 * 63, "bit {i}");
    }
}

fn set_bitmap<L: WordLayout>() {
    let mut bitset = CompressedBitset::<L>::from_bits(&DATA, bits_of(&DATA)).unwrap();
    let ones = popcount(&DATA);
    assert_eq!(ones, 101);
    assert_eq!(bitset.len(), 288);
    assert_eq!(bitset.count_ones(), ones);
    check_bytes(&bitset, &DATA, false);
    assert!(bitset.get(140));
    assert!(!bitset.get(141));

    // reopen from the raw words
    let (words, len, pending) = bitset.clone().into_parts();
    let reopened = CompressedBitset::<L>::from_parts(words, len, pending).unwrap();
    assert_eq!(reopened.count_ones(), ones);
    check_bytes(&reopened, &DATA, false);

    bitset.invert();
    assert_eq!(bitset.count_ones(), 288 - ones);
    check_bytes(&bitset, &DATA, true);
    bitset.check_invariants().unwrap();
}

#[test]
fn test_set_bitmap() {
    set_bitmap::<Plwah64>();
    set_bitmap::<Wah32>();
}

fn for_each<L: WordLayout>() {
    let mut data = DATA.to_vec();
    data.extend([0x12, 0x00, 0x10]);
    let bitset = CompressedBitset::<L>::from_bits(&data, bits_of(&data)).unwrap();

    let ones: Vec<u64> = bitset.iter_set().collect();
    assert_eq!(ones.len() as u64, popcount(&data));
    assert!(ones.windows(2).all(|w| w[0] < w[1]));
    assert!(ones.iter().all(|&i| i < bits_of(&data) && bit(&data, i)));
    assert_eq!(&ones[ones.len() - 3..], &[289, 292, 308]);

    let zeros: Vec<u64> = bitset.iter_unset().collect();
    assert_eq!(zeros.len() as u64, bits_of(&data) - popcount(&data));
    assert!(zeros.windows(2).all(|w| w[0] < w[1]));
    assert!(zeros.iter().all(|&i| i < bits_of(&data) && !bit(&data, i)));
}

#[test]
fn test_for_each() {
    for_each::<Plwah64>();
    for_each::<Wah32>();
}

fn binop<L: WordLayout>() {
    init_tracing();
    let a = CompressedBitset::<L>::from_bits(&DATA, bits_of(&DATA)).unwrap();
    let b = CompressedBitset::<L>::from_bits(&DATA2, bits_of(&DATA2)).unwrap();
    let expect = |result: &CompressedBitset<L>, f: fn(bool, bool) -> bool, tail: fn(bool) -> bool| {
        assert_eq!(result.len(), 288);
        for i in 0..288 {
            let want = if i < 160 {
                f(bit(&DATA, i), bit(&DATA2, i))
            } else {
                tail(bit(&DATA, i))
            };
            assert_eq!(result.get(i), want, "bit {i}");
        }
        result.check_invariants().unwrap();
    };

    let mut and = a.clone();
    and.and_with(&b);
    expect(&and, |x, y| x && y, |x| x);
    assert_eq!(and.iter_set().take(5).collect::<Vec<_>>(), vec![63, 76, 85, 118, 119]);

    let mut or = a.clone();
    or.or_with(&b);
    expect(&or, |x, y| x || y, |x| x);

    let mut and_not = a.clone();
    and_not.and_not_with(&b);
    expect(&and_not, |x, y| x && !y, |x| x);

    let mut not_and = a.clone();
    not_and.not_and_with(&b);
    expect(&not_and, |x, y| !x && y, |x| !x);

    // the shorter operand on the left gives the same bits
    let mut and_rev = b.clone();
    and_rev.and_with(&a);
    assert_eq!(and_rev, and);
}

#[test]
fn test_binop_unequal_lengths() {
    binop::<Plwah64>();
    binop::<Wah32>();
}

#[test]
fn test_binop_with_explicit_zero_padding() {
    let a = CompressedBitset::<Plwah64>::from_bits(&DATA, 288).unwrap();
    let mut b = CompressedBitset::<Plwah64>::from_bits(&DATA2, 160).unwrap();
    b.add_zeros(128).unwrap();
    let mut and = a.clone();
    and.and_with(&b);
    assert!((160..288).all(|i| !and.get(i)));
    assert!(and.count_ones() <= a.count_ones().min(b.count_ones()));
}

#[test]
fn test_redmine_4576() {
    let data: [u8; 32] = [
        0x1f, 0x00, 0x1f, 0x1f, //
        0x00, 0x00, 0x00, 0x00, //
        0x00, 0x00, 0x00, 0x00, //
        0x00, 0x00, 0x00, 0x00, //
        0x1f, 0x1f, 0x1f, 0x1f, //
        0x00, 0x00, 0x00, 0x00, //
        0x1f, 0x1f, 0x1f, 0x1f, //
        0x00, 0x00, 0x00, 0x00, //
    ];
    let plwah = CompressedBitset::<Plwah64>::from_bits(&data, 256).unwrap();
    check_bytes(&plwah, &data, false);
    let wah = CompressedBitset::<Wah32>::from_bits(&data, 256).unwrap();
    check_bytes(&wah, &data, false);
}

fn redmine_9437<L: WordLayout>() {
    let mut bitset = CompressedBitset::<L>::with_layout();
    bitset.add_zeros(626 * 32).unwrap();
    bitset.add_ones(32).unwrap();
    bitset.add_bits(&0xbfff_ffffu32.to_le_bytes(), 32).unwrap();

    assert!((0..626 * 32).all(|i| !bitset.get(i)));
    for i in 626 * 32..628 * 32 {
        assert_eq!(bitset.get(i), i != 628 * 32 - 2, "bit {i}");
    }
    assert_eq!(bitset.count_ones(), 63);
    bitset.check_invariants().unwrap();
}

#[test]
fn test_redmine_9437() {
    redmine_9437::<Plwah64>();
    redmine_9437::<Wah32>();
}

#[test]
fn test_set_past_end_is_rejected() {
    let mut bitset = CompressedBitset::<Wah32>::from_bits(&DATA2, 160).unwrap();
    let before = bitset.clone();
    assert_eq!(bitset.set(160), Err(Error::OutOfRange { pos: 160, len: 160 }));
    assert_eq!(bitset.reset(1000), Err(Error::OutOfRange { pos: 1000, len: 160 }));
    assert_eq!(bitset, before);
    assert!(!bitset.get(160));
}

#[test]
fn test_add_one_at_extends() {
    let mut bitset = CompressedBitset::new();
    for pos in [3, 64, 65, 1000, 1_000_000] {
        bitset.add_one_at(pos).unwrap();
    }
    assert_eq!(bitset.len(), 1_000_001);
    assert_eq!(
        bitset.iter_set().collect::<Vec<_>>(),
        vec![3, 64, 65, 1000, 1_000_000]
    );
    assert!(bitset.run_count() <= 6);
    bitset.add_one_at(10).unwrap();
    assert_eq!(bitset.count_ones(), 6);
    bitset.check_invariants().unwrap();
}

#[test]
fn test_pad_to_block() {
    let mut bitset = CompressedBitset::<Wah32>::with_layout();
    bitset.add_ones(40).unwrap();
    bitset.pad_to_block().unwrap();
    assert_eq!(bitset.len(), 62);
    assert_eq!(bitset.run_count(), 2);
    bitset.pad_to_block().unwrap();
    assert_eq!(bitset.len(), 62);
}

#[test]
fn test_saturated_counter_spills() {
    init_tracing();
    let blocks = u64::from(Wah32::MAX_BLOCKS) + 2;
    let mut bitset = CompressedBitset::<Wah32>::with_layout();
    bitset.add_zeros(blocks * 31).unwrap();
    assert_eq!(
        bitset.runs(),
        &[Word::fill(false, Wah32::MAX_BLOCKS), Word::fill(false, 2)]
    );
    bitset.check_invariants().unwrap();

    let mut ones = bitset.clone();
    ones.invert();
    assert_eq!(ones.count_ones(), blocks * 31);
    ones.and_with(&bitset);
    assert_eq!(ones.count_ones(), 0);
    assert_eq!(ones.runs(), bitset.runs());
}
