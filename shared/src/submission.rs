//! Point registration payload and its `multipart/form-data` encoding.

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::image_processing::ImageAttachment;
use crate::model::ItemId;
use crate::ITEM_ID_DELIMITER;

/// How selected item ids are folded into the single `items` form field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemIdEncoding {
    /// `3,7,12`. What the points backend splits on.
    #[default]
    Delimited,
    /// `3712`. Legacy form; ambiguous for multi-digit ids.
    Concatenated,
}

impl ItemIdEncoding {
    pub fn join(self, ids: &[ItemId]) -> String {
        let parts = ids.iter().map(ToString::to_string).collect::<Vec<_>>();
        match self {
            Self::Delimited => parts.join(ITEM_ID_DELIMITER),
            Self::Concatenated => parts.concat(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PointSubmission {
    pub name: String,
    pub email: String,
    pub whatsapp: String,
    pub uf: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub items: Vec<ItemId>,
    pub item_id_encoding: ItemIdEncoding,
    pub image: Option<ImageAttachment>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultipartBody {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PointSubmission {
    pub fn items_token(&self) -> String {
        self.item_id_encoding.join(&self.items)
    }

    /// Text parts in transmission order. Coordinates are plain decimals, never exponent form.
    pub fn text_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", self.name.clone()),
            ("email", self.email.clone()),
            ("whatsapp", self.whatsapp.clone()),
            ("uf", self.uf.clone()),
            ("city", self.city.clone()),
            ("latitude", self.latitude.to_string()),
            ("longitude", self.longitude.to_string()),
            ("items", self.items_token()),
        ]
    }

    pub fn to_multipart(&self) -> MultipartBody {
        let boundary = format!("----PointFormBoundary{}", Uuid::new_v4().simple());
        self.to_multipart_with_boundary(&boundary)
    }

    pub fn to_multipart_with_boundary(&self, boundary: &str) -> MultipartBody {
        let image_len = self.image.as_ref().map_or(0, ImageAttachment::size_bytes);
        let mut buf = BytesMut::with_capacity(512 + image_len);

        for (name, value) in self.text_fields() {
            buf.put_slice(format!("--{boundary}\r\n").as_bytes());
            buf.put_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }

        if let Some(image) = &self.image {
            buf.put_slice(format!("--{boundary}\r\n").as_bytes());
            buf.put_slice(
                format!(
                    "Content-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\n",
                    escape_quoted(image.file_name())
                )
                .as_bytes(),
            );
            buf.put_slice(format!("Content-Type: {}\r\n\r\n", image.mime_type()).as_bytes());
            buf.put_slice(image.data());
            buf.put_slice(b"\r\n");
        }

        buf.put_slice(format!("--{boundary}--\r\n").as_bytes());

        MultipartBody {
            content_type: format!("multipart/form-data; boundary={boundary}"),
            bytes: buf.to_vec(),
        }
    }
}

// Same escaping browsers apply to quoted-string parameters in form-data headers.
fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BOUNDARY: &str = "XBOUNDARYX";

    // 1x1 transparent GIF
    const TINY_GIF: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
        0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x01, 0x44, 0x00, 0x3b,
    ];

    fn sample(image: Option<ImageAttachment>) -> PointSubmission {
        PointSubmission {
            name: "Recicla Centro".into(),
            email: "contato@recicla.org".into(),
            whatsapp: "11999990000".into(),
            uf: "SP".into(),
            city: "Campinas".into(),
            latitude: -23.5,
            longitude: -46.6,
            items: vec![ItemId(3), ItemId(7)],
            item_id_encoding: ItemIdEncoding::Delimited,
            image,
        }
    }

    fn body_text(body: &MultipartBody) -> String {
        String::from_utf8_lossy(&body.bytes).into_owned()
    }

    #[test]
    fn delimited_join_keeps_ids_apart() {
        let ids = [ItemId(1), ItemId(23)];
        assert_eq!(ItemIdEncoding::Delimited.join(&ids), "1,23");
        assert_ne!(
            ItemIdEncoding::Delimited.join(&ids),
            ItemIdEncoding::Delimited.join(&[ItemId(12), ItemId(3)])
        );
    }

    #[test]
    fn concatenated_join_reproduces_legacy_token() {
        assert_eq!(ItemIdEncoding::Concatenated.join(&[ItemId(1), ItemId(23)]), "123");
        assert_eq!(ItemIdEncoding::Concatenated.join(&[ItemId(12), ItemId(3)]), "123");
    }

    #[test]
    fn empty_selection_joins_to_empty_token() {
        assert_eq!(ItemIdEncoding::Delimited.join(&[]), "");
        assert_eq!(ItemIdEncoding::Concatenated.join(&[]), "");
    }

    #[test]
    fn coordinates_never_use_exponent_notation() {
        let mut submission = sample(None);
        submission.latitude = 1e-7;
        submission.longitude = -1.5e-9;
        let fields = submission.text_fields();
        assert!(fields.contains(&("latitude", "0.0000001".to_string())));
        assert!(fields.contains(&("longitude", "-0.0000000015".to_string())));
    }

    #[test]
    fn coordinates_use_shortest_decimal_form() {
        let mut submission = sample(None);
        submission.latitude = 0.0;
        let fields = submission.text_fields();
        assert!(fields.contains(&("latitude", "0".to_string())));
        assert!(fields.contains(&("longitude", "-46.6".to_string())));
    }

    #[test]
    fn text_fields_are_in_transmission_order() {
        let names: Vec<_> = sample(None).text_fields().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            ["name", "email", "whatsapp", "uf", "city", "latitude", "longitude", "items"]
        );
    }

    #[test]
    fn multipart_without_image() {
        let body = sample(None).to_multipart_with_boundary(BOUNDARY);
        let text = body_text(&body);

        assert_eq!(body.content_type, "multipart/form-data; boundary=XBOUNDARYX");
        assert!(text.contains("name=\"uf\"\r\n\r\nSP\r\n"));
        assert!(text.contains("name=\"city\"\r\n\r\nCampinas\r\n"));
        assert!(text.contains("name=\"items\"\r\n\r\n3,7\r\n"));
        assert!(text.contains("name=\"latitude\"\r\n\r\n-23.5\r\n"));
        assert!(!text.contains("name=\"image\""));
        assert_eq!(text.matches("--XBOUNDARYX\r\n").count(), 8);
        assert!(text.ends_with("--XBOUNDARYX--\r\n"));
    }

    #[test]
    fn multipart_with_image_part() {
        let image = ImageAttachment::new("logo.gif", TINY_GIF.to_vec()).unwrap();
        let body = sample(Some(image)).to_multipart_with_boundary(BOUNDARY);
        let text = body_text(&body);

        assert!(text.contains(
            "Content-Disposition: form-data; name=\"image\"; filename=\"logo.gif\"\r\nContent-Type: image/gif\r\n\r\n"
        ));
        assert_eq!(text.matches("--XBOUNDARYX\r\n").count(), 9);
        assert!(body
            .bytes
            .windows(TINY_GIF.len())
            .any(|window| window == TINY_GIF));
    }

    #[test]
    fn file_name_quotes_are_escaped() {
        assert_eq!(escape_quoted("a\"b\r\n.png"), "a%22b%0D%0A.png");
    }

    #[test]
    fn random_boundaries_differ() {
        let submission = sample(None);
        assert_ne!(
            submission.to_multipart().content_type,
            submission.to_multipart().content_type
        );
    }

    proptest! {
        #[test]
        fn delimited_token_round_trips(raw in proptest::collection::vec(0u32..100_000, 0..12)) {
            let ids: Vec<ItemId> = raw.iter().copied().map(ItemId).collect();
            let token = ItemIdEncoding::Delimited.join(&ids);
            let parsed: Vec<ItemId> = if token.is_empty() {
                Vec::new()
            } else {
                token.split(',').map(|s| ItemId(s.parse().unwrap())).collect()
            };
            prop_assert_eq!(parsed, ids);
        }
    }
}
