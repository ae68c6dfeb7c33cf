// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the ticketpress-document crate: image
// normalisation on the re-encode path and page rendering.

use chrono::Utc;
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, Rgba, RgbaImage};

use ticketpress_core::{EventTime, PaperSize, Price, TicketPage, TicketRecord};
use ticketpress_document::image::normalize::LoadedImage;
use ticketpress_document::{ImageNormalizer, ImageProcessor, PageRenderer, PdfTicketRenderer};

/// 800x400 high-entropy PNG, well over a 64 KiB budget.
fn noisy_png() -> Vec<u8> {
    let mut state: u32 = 0xDEAD_BEEF;
    let img = RgbaImage::from_fn(800, 400, |_, _| {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let [r, g, b, _] = state.to_le_bytes();
        Rgba([r, g, b, 255])
    });
    ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(img))
        .to_png_bytes()
        .expect("encode bench image")
}

fn bench_normalize(c: &mut Criterion) {
    let png = noisy_png();
    let normalizer = ImageNormalizer::new(64 * 1024, 600, 80);

    c.bench_function("normalize_bytes (800x400 png, 64 KiB budget)", |b| {
        b.iter(|| {
            let out = normalizer.normalize_bytes(LoadedImage {
                bytes: black_box(png.clone()),
                declared_mime: None,
            });
            black_box(out.asset);
        });
    });
}

fn bench_render(c: &mut Criterion) {
    let page = TicketPage {
        position: 1,
        record: TicketRecord {
            title: "Bench Night".into(),
            date_time: EventTime::Text("2026-05-01 20:00".into()),
            location: "Main Hall".into(),
            reference: "BENCH-1".into(),
            ticket_type: "General".into(),
            price: Price::Amount("25.00".into()),
            address: None,
            organizer: "Event Organizer".into(),
            event_type: "CONCERT".into(),
            image: None,
            qr_code: None,
            sequence: 1,
            batch_size: 1,
            generated_at: Utc::now(),
        },
        image: None,
        qr_code: None,
        paper_size: PaperSize::Ticket,
    };
    let renderer = PdfTicketRenderer::new();

    c.bench_function("render ticket page (text only)", |b| {
        b.iter(|| black_box(renderer.render(black_box(&page)).expect("render")));
    });
}

criterion_group!(benches, bench_normalize, bench_render);
criterion_main!(benches);
