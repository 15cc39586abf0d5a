use amos_inspect::architectures::m68k::{classify, disassemble};
use amos_inspect::compression::squash::unsquash;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    group.throughput(Throughput::Elements(0x1_0000));
    group.bench_function("all_opcodes", |b| {
        b.iter(|| {
            (0..=u16::MAX)
                .filter(|&op| classify(black_box(op)).is_some())
                .count()
        })
    });
    group.finish();
}

fn bench_disassemble(c: &mut Criterion) {
    // MOVEM.L D0-D7/A0-A6,-(A7); LEA $10(PC),A0; MOVE.W (A0)+,D0; DBF D0,*; RTS
    let chunk: [u8; 14] = [
        0x48, 0xE7, 0xFF, 0xFE, 0x41, 0xFA, 0x00, 0x10, 0x30, 0x18, 0x51, 0xC8, 0xFF, 0xFE,
    ];
    let code: Vec<u8> = chunk
        .iter()
        .copied()
        .cycle()
        .take(chunk.len() * 1024)
        .chain([0x4E, 0x75])
        .collect();

    let mut group = c.benchmark_group("disassemble");
    group.throughput(Throughput::Bytes(code.len() as u64));
    group.bench_function("mixed", |b| b.iter(|| disassemble(black_box(&code), 0).len()));
    group.finish();
}

/// Literal-only squash stream, laid out the way the decoder consumes it.
fn squash_literals(data: &[u8]) -> Vec<u8> {
    let mut bits = Vec::new();
    let mut put = |value: u32, count: u32| {
        for i in (0..count).rev() {
            bits.push((value >> i) & 1);
        }
    };
    for chunk in data.rchunks(8) {
        put(0, 2);
        put(chunk.len() as u32 - 1, 3);
        for &b in chunk.iter().rev() {
            put(u32::from(b), 8);
        }
    }

    let words: Vec<u32> = bits
        .chunks(32)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u32, |acc, (i, &b)| acc | (b << i))
        })
        .collect();
    let initial = 1u32;
    let seed = words.iter().fold(initial, |acc, w| acc ^ w);

    let mut region = Vec::new();
    for w in words.iter().rev() {
        region.extend_from_slice(&w.to_be_bytes());
    }
    region.extend_from_slice(&initial.to_be_bytes());
    region.extend_from_slice(&seed.to_be_bytes());
    region.extend_from_slice(&(data.len() as u32).to_be_bytes());

    let mut out = b"xVdg".to_vec();
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(&(region.len() as u32).to_be_bytes());
    out.extend_from_slice(&region);
    out
}

fn bench_unsquash(c: &mut Criterion) {
    let data: Vec<u8> = (0..64 * 1024u32).map(|i| (i * 31 % 251) as u8).collect();
    let packed = squash_literals(&data);

    let mut group = c.benchmark_group("squash");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("literals_64k", |b| b.iter(|| unsquash(black_box(&packed))));
    group.finish();
}

criterion_group!(benches, bench_classify, bench_disassemble, bench_unsquash);
criterion_main!(benches);
