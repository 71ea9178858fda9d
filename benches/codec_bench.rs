use criterion::{black_box, criterion_group, criterion_main, Criterion};
use codarcs::header::{timestamp_from_raw, Header};
use codarcs::spectrum::transform;
use codarcs::{BlockMap, Channel, CsFile, CsReader, Identity, Shape, Spectrum};

const RANGE_CELLS:   i32 = 32;
const DOPPLER_CELLS: i32 = 512;

fn sample_file(cskind: i16) -> CsFile {
    let mut blocks = BlockMap::new();
    blocks.insert("TIME".parse().unwrap(), vec![0u8; 16]);

    let header = Header {
        version:              6,
        timestamp:            timestamp_from_raw(3_707_575_200),
        cskind,
        site_code:            "ASSA".parse().unwrap(),
        cover_minutes:        60,
        deleted_source:       false,
        override_source:      false,
        start_freq_mhz:       4.55,
        rep_freq_mhz:         2.0,
        bandwidth_khz:        25.7,
        sweep_up:             true,
        num_doppler_cells:    DOPPLER_CELLS,
        num_range_cells:      RANGE_CELLS,
        first_range_cell:     1,
        range_cell_dist_km:   5.83,
        output_interval:      60,
        create_type_code:     "CSSW".parse().unwrap(),
        creator_version:      "1.02".parse().unwrap(),
        num_active_channels:  3,
        num_spectra_channels: 3,
        active_channels:      7,
        blocks,
    };
    let spectrum = Spectrum::zeros(Shape::of(&header).unwrap());
    CsFile::new(header, spectrum)
}

fn encode(file: &CsFile) -> Vec<u8> {
    let mut out = Vec::new();
    codarcs::dump(file, &mut out).unwrap();
    out
}

fn bench_load(c: &mut Criterion) {
    let plain = encode(&sample_file(1));
    let with_quality = encode(&sample_file(2));

    c.bench_function("load_32x512", |b| b.iter(|| codarcs::load(black_box(&plain[..])).unwrap()));
    c.bench_function("load_32x512_quality", |b| {
        b.iter(|| codarcs::load(black_box(&with_quality[..])).unwrap())
    });

    let to_db = transform::from_fn(|channel: Channel, row: Vec<f32>| {
        if channel.is_complex() {
            return Ok(row);
        }
        Ok(row.into_iter().map(|v| 10.0 * v.abs().max(1e-12).log10()).collect())
    });
    c.bench_function("load_32x512_transform", |b| {
        b.iter(|| codarcs::load_with(black_box(&plain[..]), &to_db).unwrap())
    });
}

fn bench_dump(c: &mut Criterion) {
    let file = sample_file(2);
    c.bench_function("dump_32x512_quality", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(512 * 1024);
            codarcs::dump(black_box(&file), &mut out).unwrap();
            out
        })
    });
}

fn bench_load_many(c: &mut Criterion) {
    let bytes = encode(&sample_file(1));
    let sources: Vec<&[u8]> = (0..16).map(|_| &bytes[..]).collect();
    let reader = CsReader::new();

    c.bench_function("load_many_16x", |b| {
        b.iter(|| codarcs::load_many(&reader, black_box(&sources), &Identity))
    });
}

criterion_group!(benches, bench_load, bench_dump, bench_load_many);
criterion_main!(benches);
