//! NeuQuant neural-network color quantizer.
//!
//! A Kohonen-style self-organizing map that learns a palette of up to 256
//! colors from a flat BGR byte buffer, then answers nearest-neighbor queries
//! through a green-sorted secondary index. The arithmetic follows Anthony
//! Dekker's published NeuQuant algorithm ("Kohonen neural networks for
//! optimal colour quantization", Network: Computation in Neural Systems,
//! Vol. 5, 1994) using 32-bit signed fixed-point throughout, so palettes are
//! bit-compatible with the reference implementation.

/// Color components are held left-shifted by this during learning
/// (fixed point with 4 fractional bits).
const NET_BIAS_SHIFT: i32 = 4;

/// Number of learning cycles.
const N_CYCLES: usize = 100;

const INT_BIAS_SHIFT: i32 = 16;
const INT_BIAS: i32 = 1 << INT_BIAS_SHIFT;
const GAMMA_SHIFT: i32 = 10;
const BETA_SHIFT: i32 = 10;
const BETA: i32 = INT_BIAS >> BETA_SHIFT;
const BETA_GAMMA: i32 = INT_BIAS << (GAMMA_SHIFT - BETA_SHIFT);

const RADIUS_BIAS_SHIFT: i32 = 6;
const RADIUS_BIAS: i32 = 1 << RADIUS_BIAS_SHIFT;
const RADIUS_DEC: i32 = 30;

const ALPHA_BIAS_SHIFT: i32 = 10;
const INIT_ALPHA: i32 = 1 << ALPHA_BIAS_SHIFT;

const RAD_BIAS_SHIFT: i32 = 8;
const RAD_BIAS: i32 = 1 << RAD_BIAS_SHIFT;
const ALPHA_RAD_B_SHIFT: i32 = 18;
const ALPHA_RAD_BIAS: i32 = 1 << ALPHA_RAD_B_SHIFT;

/// Primes near 500 used to stride through the image. A picture whose length
/// is divisible by all four would need a fifth; assume it is not.
const PRIME1: usize = 499;
const PRIME2: usize = 491;
const PRIME3: usize = 487;
const PRIME4: usize = 503;

/// Inputs smaller than this are sampled exhaustively.
const MIN_PICTURE_BYTES: usize = 3 * PRIME4;

/// Neural-network color quantizer over a BGR pixel buffer.
///
/// Construction runs the full pipeline: network initialization, the
/// sampled learning loop, unbiasing, and the green-sorted index build.
/// Afterwards [`map`](Self::map) answers nearest-color queries.
#[derive(Debug, Clone)]
pub struct NeuQuant {
    netsize: usize,
    /// Rows are (B, G, R, original index). Colors are biased during
    /// learning and unbiased to 0..=255 before the index is built.
    net: Vec<[i32; 4]>,
    /// For each green value, the network position to start searching from.
    netindex: [usize; 256],
    bias: Vec<i32>,
    freq: Vec<i32>,
    radpower: Vec<i32>,
    samplefac: i32,
}

impl NeuQuant {
    /// Learn a network of `netsize` colors (clamped to 2..=256) from a flat
    /// BGR buffer. `samplefac` is the sampling factor in 1..=30; 1 samples
    /// every pixel and is forced for inputs smaller than one stride.
    pub fn new(samplefac: i32, netsize: usize, pixels: &[u8]) -> Self {
        // A trailing partial triplet would put the stride walk out of bounds.
        let pixels = &pixels[..pixels.len() - pixels.len() % 3];
        let netsize = netsize.clamp(2, 256);
        let samplefac = if pixels.len() < MIN_PICTURE_BYTES {
            1
        } else {
            samplefac.clamp(1, 30)
        };

        let mut quantizer = Self {
            netsize,
            net: Vec::with_capacity(netsize),
            netindex: [0; 256],
            bias: vec![0; netsize],
            freq: vec![INT_BIAS / netsize as i32; netsize],
            radpower: Vec::new(),
            samplefac,
        };
        for i in 0..netsize {
            let v = ((i << (NET_BIAS_SHIFT + 8)) / netsize) as i32;
            quantizer.net.push([v, v, v, 0]);
        }
        if !pixels.is_empty() {
            quantizer.learn(pixels);
        }
        quantizer.unbias();
        quantizer.build_index();
        quantizer
    }

    /// Number of learned colors.
    pub fn color_count(&self) -> usize {
        self.netsize
    }

    /// BGR color of the neuron carrying the given original index, or `None`
    /// if no neuron does. Positions shift during the index sort, so lookups
    /// go by the stored original index rather than array position.
    pub fn color_bgr(&self, original_index: usize) -> Option<[u8; 3]> {
        self.net
            .iter()
            .find(|n| n[3] == original_index as i32)
            .map(|n| {
                [
                    n[0].clamp(0, 255) as u8,
                    n[1].clamp(0, 255) as u8,
                    n[2].clamp(0, 255) as u8,
                ]
            })
    }

    /// Nearest-neuron lookup for an unbiased BGR color. Returns the winning
    /// neuron's original index.
    ///
    /// Walks outward in both directions from the green-index entry point,
    /// pruning on the green distance; the result is the Manhattan-nearest
    /// neuron.
    pub fn map(&self, b: u8, g: u8, r: u8) -> usize {
        let (b, g, r) = (i32::from(b), i32::from(g), i32::from(r));
        // Larger than the worst possible distance of 3 * 255.
        let mut bestd = 1000;
        let mut best: i32 = -1;
        let mut i = self.netindex[g as usize] as i32;
        let mut j = i - 1;

        while (i as usize) < self.netsize || j >= 0 {
            if (i as usize) < self.netsize {
                let p = &self.net[i as usize];
                let mut dist = p[1] - g;
                if dist >= bestd {
                    // Everything above is even further in green.
                    i = self.netsize as i32;
                } else {
                    i += 1;
                    if dist < 0 {
                        dist = -dist;
                    }
                    let mut a = p[0] - b;
                    if a < 0 {
                        a = -a;
                    }
                    dist += a;
                    if dist < bestd {
                        a = p[2] - r;
                        if a < 0 {
                            a = -a;
                        }
                        dist += a;
                        if dist < bestd {
                            bestd = dist;
                            best = p[3];
                        }
                    }
                }
            }
            if j >= 0 {
                let p = &self.net[j as usize];
                let mut dist = g - p[1];
                if dist >= bestd {
                    j = -1;
                } else {
                    j -= 1;
                    if dist < 0 {
                        dist = -dist;
                    }
                    let mut a = p[0] - b;
                    if a < 0 {
                        a = -a;
                    }
                    dist += a;
                    if dist < bestd {
                        a = p[2] - r;
                        if a < 0 {
                            a = -a;
                        }
                        dist += a;
                        if dist < bestd {
                            bestd = dist;
                            best = p[3];
                        }
                    }
                }
            }
        }
        best.max(0) as usize
    }

    fn learn(&mut self, pixels: &[u8]) {
        let lengthcount = pixels.len();
        let alphadec = 30 + (self.samplefac - 1) / 3;
        let samplepixels = lengthcount / (3 * self.samplefac as usize);
        let delta = (samplepixels / N_CYCLES).max(1);

        let mut alpha = INIT_ALPHA;
        let initrad = (self.netsize >> 3) as i32;
        let mut radius = initrad * RADIUS_BIAS;
        let mut rad = radius >> RADIUS_BIAS_SHIFT;
        if rad <= 1 {
            rad = 0;
        }
        self.compute_radpower(rad, alpha);

        let step = sampling_step(lengthcount);

        let mut pos = 0;
        for i in 1..=samplepixels {
            let b = i32::from(pixels[pos]) << NET_BIAS_SHIFT;
            let g = i32::from(pixels[pos + 1]) << NET_BIAS_SHIFT;
            let r = i32::from(pixels[pos + 2]) << NET_BIAS_SHIFT;
            let winner = self.contest(b, g, r);

            self.alter_single(alpha, winner, b, g, r);
            if rad != 0 {
                self.alter_neighbors(rad, winner, b, g, r);
            }

            pos += step;
            while pos >= lengthcount {
                pos -= lengthcount;
            }

            if i % delta == 0 {
                alpha -= alpha / alphadec;
                radius -= radius / RADIUS_DEC;
                rad = radius >> RADIUS_BIAS_SHIFT;
                if rad <= 1 {
                    rad = 0;
                }
                self.compute_radpower(rad, alpha);
            }
        }
    }

    fn compute_radpower(&mut self, rad: i32, alpha: i32) {
        self.radpower.clear();
        for n in 0..rad {
            self.radpower
                .push(alpha * (((rad * rad - n * n) * RAD_BIAS) / (rad * rad)));
        }
    }

    /// Find the best-matching neuron under frequency bias and adjust the
    /// bias/frequency accounting of the whole network.
    fn contest(&mut self, b: i32, g: i32, r: i32) -> usize {
        let mut bestd = i32::MAX;
        let mut bestbiasd = i32::MAX;
        let mut bestpos = 0;
        let mut bestbiaspos = 0;

        for i in 0..self.netsize {
            let n = &self.net[i];
            let mut dist = n[0] - b;
            if dist < 0 {
                dist = -dist;
            }
            let mut a = n[1] - g;
            if a < 0 {
                a = -a;
            }
            dist += a;
            a = n[2] - r;
            if a < 0 {
                a = -a;
            }
            dist += a;

            if dist < bestd {
                bestd = dist;
                bestpos = i;
            }
            let biasdist = dist - (self.bias[i] >> (INT_BIAS_SHIFT - NET_BIAS_SHIFT));
            if biasdist < bestbiasd {
                bestbiasd = biasdist;
                bestbiaspos = i;
            }
            let betafreq = self.freq[i] >> BETA_SHIFT;
            self.freq[i] -= betafreq;
            self.bias[i] += betafreq << GAMMA_SHIFT;
        }
        self.freq[bestpos] += BETA;
        self.bias[bestpos] -= BETA_GAMMA;
        bestbiaspos
    }

    /// Move neuron `i` toward the sample by a factor of `alpha / INIT_ALPHA`.
    fn alter_single(&mut self, alpha: i32, i: usize, b: i32, g: i32, r: i32) {
        let n = &mut self.net[i];
        n[0] -= alpha * (n[0] - b) / INIT_ALPHA;
        n[1] -= alpha * (n[1] - g) / INIT_ALPHA;
        n[2] -= alpha * (n[2] - r) / INIT_ALPHA;
    }

    /// Move neurons within `rad` of `i` toward the sample, weighted by the
    /// precomputed radius falloff.
    fn alter_neighbors(&mut self, rad: i32, i: usize, b: i32, g: i32, r: i32) {
        let lo = (i as i32 - rad).max(-1);
        let hi = (i as i32 + rad).min(self.netsize as i32);

        let mut j = i as i32 + 1;
        let mut k = i as i32 - 1;
        let mut m = 1;
        while j < hi || k > lo {
            let a = self.radpower[m];
            m += 1;
            if j < hi {
                let n = &mut self.net[j as usize];
                n[0] -= a * (n[0] - b) / ALPHA_RAD_BIAS;
                n[1] -= a * (n[1] - g) / ALPHA_RAD_BIAS;
                n[2] -= a * (n[2] - r) / ALPHA_RAD_BIAS;
                j += 1;
            }
            if k > lo {
                let n = &mut self.net[k as usize];
                n[0] -= a * (n[0] - b) / ALPHA_RAD_BIAS;
                n[1] -= a * (n[1] - g) / ALPHA_RAD_BIAS;
                n[2] -= a * (n[2] - r) / ALPHA_RAD_BIAS;
                k -= 1;
            }
        }
    }

    /// Strip the fixed-point bias from the colors and record each neuron's
    /// original position.
    fn unbias(&mut self) {
        for (i, n) in self.net.iter_mut().enumerate() {
            n[0] >>= NET_BIAS_SHIFT;
            n[1] >>= NET_BIAS_SHIFT;
            n[2] >>= NET_BIAS_SHIFT;
            n[3] = i as i32;
        }
    }

    /// Sort the network by green (selection sort, swapping whole rows) and
    /// fill `netindex` so queries can start near their green value.
    fn build_index(&mut self) {
        let mut previouscol = 0;
        let mut startpos = 0;

        for i in 0..self.netsize {
            let mut smallpos = i;
            let mut smallval = self.net[i][1];
            for j in (i + 1)..self.netsize {
                if self.net[j][1] < smallval {
                    smallpos = j;
                    smallval = self.net[j][1];
                }
            }
            if i != smallpos {
                self.net.swap(i, smallpos);
            }
            let smallval = smallval as usize;
            if smallval != previouscol {
                self.netindex[previouscol] = (startpos + i) >> 1;
                for entry in &mut self.netindex[(previouscol + 1)..smallval] {
                    *entry = i;
                }
                previouscol = smallval;
                startpos = i;
            }
        }
        let maxpos = self.netsize - 1;
        self.netindex[previouscol] = (startpos + maxpos) >> 1;
        for entry in &mut self.netindex[(previouscol + 1)..256] {
            *entry = maxpos;
        }
    }
}

/// Byte stride used to walk the input: the first prime (times three) that
/// does not divide the buffer length, or 3 for small pictures.
fn sampling_step(length: usize) -> usize {
    if length < MIN_PICTURE_BYTES {
        3
    } else if length % PRIME1 != 0 {
        3 * PRIME1
    } else if length % PRIME2 != 0 {
        3 * PRIME2
    } else if length % PRIME3 != 0 {
        3 * PRIME3
    } else {
        3 * PRIME4
    }
}
