use std::path::Path;

use burn::prelude::*;
use image::{DynamicImage, ImageBuffer, Luma, Rgb, Rgb32FImage, RgbImage, imageops};

use super::DatasetError;

/// One channel of a [`RetinaImage`].
pub type Plane = ImageBuffer<Luma<f32>, Vec<f32>>;

/// A decoded image kept as one `f32` plane per channel, values in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct RetinaImage {
    planes: Vec<Plane>,
}

impl RetinaImage {
    /// Builds an image from a channel-first (CHW) buffer.
    pub fn new(channels: usize, height: usize, width: usize, data: Vec<f32>) -> Self {
        assert!(channels > 0, "An image needs at least one channel");
        assert_eq!(
            data.len(),
            channels * height * width,
            "Image buffer does not match its {channels}x{height}x{width} shape"
        );

        let planes = (0..channels)
            .map(|c| {
                Plane::from_fn(width as u32, height as u32, |x, y| {
                    Luma([data[(c * height + y as usize) * width + x as usize]])
                })
            })
            .collect();

        Self { planes }
    }

    pub fn zeros(channels: usize, height: usize, width: usize) -> Self {
        assert!(channels > 0, "An image needs at least one channel");

        Self {
            planes: vec![Plane::new(width as u32, height as u32); channels],
        }
    }

    /// Loads a fundus photograph as three channels.
    pub fn load_rgb(path: &Path) -> Result<Self, DatasetError> {
        Ok(Self::from_rgb(open(path)?))
    }

    /// Loads a FOV mask or a manual annotation as a single `{0, 1}` channel.
    pub fn load_binary(path: &Path) -> Result<Self, DatasetError> {
        Ok(Self::from_binary(open(path)?))
    }

    pub fn from_rgb(image: DynamicImage) -> Self {
        let rgb = image.into_rgb32f();

        let planes = (0..3)
            .map(|c| {
                Plane::from_fn(rgb.width(), rgb.height(), |x, y| {
                    Luma([rgb.get_pixel(x, y)[c]])
                })
            })
            .collect();

        Self { planes }
    }

    /// Every color type goes through luma, and any non-zero pixel is positive.
    pub fn from_binary(image: DynamicImage) -> Self {
        let luma = image.into_luma8();
        let plane = Plane::from_fn(luma.width(), luma.height(), |x, y| {
            Luma([if luma.get_pixel(x, y)[0] > 0 { 1.0 } else { 0.0 }])
        });

        Self {
            planes: vec![plane],
        }
    }

    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    pub fn height(&self) -> usize {
        self.planes[0].height() as usize
    }

    pub fn width(&self) -> usize {
        self.planes[0].width() as usize
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// Channel-first copy of the pixels.
    pub fn to_vec(&self) -> Vec<f32> {
        self.planes
            .iter()
            .flat_map(|plane| plane.as_raw().iter().copied())
            .collect()
    }

    /// Copies the `height x width` window whose top-left corner is `(top, left)`.
    pub fn crop(
        &self,
        top: usize,
        left: usize,
        height: usize,
        width: usize,
    ) -> Result<Self, DatasetError> {
        if top + height > self.height() || left + width > self.width() {
            return Err(DatasetError::WindowTooLarge {
                height,
                width,
                image_height: self.height(),
                image_width: self.width(),
            });
        }

        Ok(self.map_planes(|plane| {
            imageops::crop_imm(plane, left as u32, top as u32, width as u32, height as u32)
                .to_image()
        }))
    }

    /// Crops a centered `size x size` window, rounding the offsets down.
    pub fn center_crop(&self, size: usize) -> Result<Self, DatasetError> {
        let top = self.height().saturating_sub(size) / 2;
        let left = self.width().saturating_sub(size) / 2;

        self.crop(top, left, size, size)
    }

    pub fn flip_horizontal(&self) -> Self {
        self.map_planes(imageops::flip_horizontal)
    }

    pub fn flip_vertical(&self) -> Self {
        self.map_planes(imageops::flip_vertical)
    }

    fn map_planes(&self, f: impl Fn(&Plane) -> Plane) -> Self {
        Self {
            planes: self.planes.iter().map(f).collect(),
        }
    }

    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 3> {
        Tensor::<B, 3>::from_data(
            TensorData::new(
                self.to_vec(),
                Shape::new([self.channels(), self.height(), self.width()]),
            )
            .convert::<B::FloatElem>(),
            device,
        )
    }

    /// Copies a `[channels, height, width]` tensor back to host memory.
    pub fn from_tensor<B: Backend>(tensor: Tensor<B, 3>) -> Self {
        let [channels, height, width] = tensor.dims();
        let data = tensor.into_data().iter::<f32>().collect();

        Self::new(channels, height, width, data)
    }

    /// Renders the first channel (or all three for RGB) as an 8-bit RGB image.
    pub fn to_rgb8(&self) -> RgbImage {
        let channel = |c: usize| if self.channels() >= 3 { c } else { 0 };

        let rgb = Rgb32FImage::from_fn(self.width() as u32, self.height() as u32, |x, y| {
            let value = |c: usize| self.planes[channel(c)].get_pixel(x, y)[0].clamp(0.0, 1.0);
            Rgb([value(0), value(1), value(2)])
        });

        DynamicImage::ImageRgb32F(rgb).into_rgb8()
    }
}

/// One source image of a split with its FOV mask and manual annotation.
#[derive(Clone, Debug)]
pub struct RetinaTriple {
    pub name: String,
    pub image: RetinaImage,
    pub mask: RetinaImage,
    pub target: RetinaImage,
}

impl RetinaTriple {
    pub fn map(
        &self,
        f: impl Fn(&RetinaImage) -> Result<RetinaImage, DatasetError>,
    ) -> Result<Self, DatasetError> {
        Ok(Self {
            name: self.name.clone(),
            image: f(&self.image)?,
            mask: f(&self.mask)?,
            target: f(&self.target)?,
        })
    }
}

fn open(path: &Path) -> Result<DynamicImage, DatasetError> {
    image::open(path).map_err(|source| DatasetError::Image {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(height: usize, width: usize) -> RetinaImage {
        let data = (0..height * width).map(|i| i as f32).collect();
        RetinaImage::new(1, height, width, data)
    }

    #[test]
    fn crop_copies_the_requested_window() {
        let image = ramp(4, 5);

        let window = image.crop(1, 2, 2, 3).unwrap();

        assert_eq!((window.height(), window.width()), (2, 3));
        assert_eq!(window.to_vec(), vec![7.0, 8.0, 9.0, 12.0, 13.0, 14.0]);
    }

    #[test]
    fn crop_rejects_windows_outside_the_image() {
        let image = ramp(4, 5);

        assert!(matches!(
            image.crop(2, 0, 3, 3),
            Err(DatasetError::WindowTooLarge { .. })
        ));
    }

    #[test]
    fn center_crop_rounds_offsets_down() {
        let image = ramp(5, 6);

        let window = image.center_crop(2).unwrap();

        // top = 1, left = 2
        assert_eq!(window.to_vec(), vec![8.0, 9.0, 14.0, 15.0]);
    }

    #[test]
    fn flips_mirror_pixels() {
        let image = ramp(2, 3);

        assert_eq!(image.flip_horizontal().to_vec(), vec![2.0, 1.0, 0.0, 5.0, 4.0, 3.0]);
        assert_eq!(image.flip_vertical().to_vec(), vec![3.0, 4.0, 5.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn rgb_conversion_is_channel_first() {
        let image = RgbImage::from_fn(2, 1, |x, _| Rgb([255, 0, if x == 1 { 255 } else { 0 }]));

        let retina = RetinaImage::from_rgb(DynamicImage::ImageRgb8(image));

        assert_eq!(retina.channels(), 3);
        assert_eq!(retina.to_vec(), vec![1.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn binary_planes_use_luma_for_every_color_type() {
        // Green only: the red channel alone would read it as background.
        let rgb8 = RgbImage::from_fn(2, 1, |x, _| Rgb([0, if x == 0 { 200 } else { 0 }, 0]));
        let rgb16: ImageBuffer<Rgb<u16>, Vec<u16>> =
            ImageBuffer::from_fn(2, 1, |x, _| Rgb([0, 0, if x == 1 { 60_000 } else { 0 }]));

        let from_rgb8 = RetinaImage::from_binary(DynamicImage::ImageRgb8(rgb8));
        let from_rgb16 = RetinaImage::from_binary(DynamicImage::ImageRgb16(rgb16));

        assert_eq!(from_rgb8.channels(), 1);
        assert_eq!(from_rgb8.to_vec(), vec![1.0, 0.0]);
        assert_eq!(from_rgb16.to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn tensor_conversion_keeps_the_layout() {
        let device = Default::default();
        let image = RetinaImage::new(2, 2, 3, (0..12).map(|i| i as f32).collect());

        let tensor = image.to_tensor::<burn::backend::NdArray>(&device);

        assert_eq!(tensor.dims(), [2, 2, 3]);
        assert_eq!(RetinaImage::from_tensor(tensor), image);
    }
}
